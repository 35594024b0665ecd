//! Agents that turn prompts into workspace artifacts.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::core::types::Role;
use crate::io::generator::{GenerateRequest, GenerationError, Generator};
use crate::io::prompt::{PromptBuilder, PromptInputs};

pub mod solution;
pub mod tester;

/// Settings shared by every agent invocation.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
    pub timeout: Duration,
}

/// Render the prompt for `role`, send it to `generator` and extract the
/// source from the reply.
pub(crate) fn generate_source<G: Generator>(
    generator: &G,
    role: Role,
    model: &str,
    settings: &AgentSettings,
    inputs: &PromptInputs,
    log_path: &Path,
) -> Result<String> {
    let prompt = PromptBuilder::new(settings.prompt_budget_bytes)
        .build(role, inputs)?
        .render();
    debug!(role = %role, prompt_bytes = prompt.len(), "built prompt");

    let request = GenerateRequest {
        role,
        model: model.to_string(),
        prompt,
        timeout: settings.timeout,
        output_limit_bytes: settings.output_limit_bytes,
        log_path: log_path.to_path_buf(),
    };
    let reply = generator.generate(&request)?;
    extract_source(&reply)
}

/// Body of the first fenced code block in `reply`, or the whole reply when it
/// has none. A blank result is a generation failure.
pub fn extract_source(reply: &str) -> Result<String> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[ \t]*[\w+.-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
    });

    let body = FENCE_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map_or(reply, |m| m.as_str());
    let body = body.trim_matches(['\n', '\r']).trim_end();
    if body.trim().is_empty() {
        return Err(GenerationError::EmptyReply.into());
    }
    Ok(format!("{body}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_fenced_block() {
        let reply = "Here you go:\n```python\nprint(1)\n```\nand\n```python\nprint(2)\n```\n";
        assert_eq!(extract_source(reply).expect("source"), "print(1)\n");
    }

    #[test]
    fn untagged_fence_is_accepted() {
        let reply = "```\n3\n1 2\n```";
        assert_eq!(extract_source(reply).expect("source"), "3\n1 2\n");
    }

    #[test]
    fn space_before_language_tag_is_accepted() {
        let reply = "``` python\nprint(1)\n```\n";
        assert_eq!(extract_source(reply).expect("source"), "print(1)\n");
        let reply = "Answer:\n```\tsh \r\necho hi\r\n```";
        assert_eq!(extract_source(reply).expect("source"), "echo hi\n");
    }

    #[test]
    fn bare_reply_is_used_as_is() {
        let reply = "\nn = int(input())\nprint(n * 2)\n\n";
        assert_eq!(
            extract_source(reply).expect("source"),
            "n = int(input())\nprint(n * 2)\n"
        );
    }

    #[test]
    fn indentation_is_preserved() {
        let reply = "```python\nfor i in range(3):\n    print(i)\n```";
        assert_eq!(
            extract_source(reply).expect("source"),
            "for i in range(3):\n    print(i)\n"
        );
    }

    struct EchoPromptGenerator;

    impl Generator for EchoPromptGenerator {
        fn generate(&self, request: &GenerateRequest) -> Result<String> {
            Ok(format!(
                "```text\nrole={} model={} limit={}\n{}\n```",
                request.role, request.model, request.output_limit_bytes, request.prompt
            ))
        }
    }

    #[test]
    fn generate_source_builds_request_from_settings() {
        let settings = AgentSettings {
            prompt_budget_bytes: 10_000,
            output_limit_bytes: 321,
            timeout: Duration::from_secs(2),
        };
        let inputs = PromptInputs {
            problem: "Reverse a string.".to_string(),
            ..PromptInputs::default()
        };

        let source = generate_source(
            &EchoPromptGenerator,
            Role::Brute,
            "model-b",
            &settings,
            &inputs,
            Path::new("/tmp/generator.brute.log"),
        )
        .expect("source");

        assert!(source.starts_with("role=brute model=model-b limit=321\n"), "{source}");
        assert!(source.contains("Reverse a string."), "{source}");
    }

    #[test]
    fn empty_block_is_an_error() {
        let err = extract_source("```python\n\n```").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::EmptyReply)
        ));
        assert!(extract_source("   ").is_err());
    }
}
