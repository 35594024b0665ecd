//! Test-only helpers: scripted generators and ready-made configs.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::types::Role;
use crate::io::config::{
    ApiKeys, ExecutionConfig, FileNames, GeneratorConfig, Models, OutputConfig, SolverConfig,
};
use crate::io::generator::{GenerateRequest, Generator};

/// Generator that replays queued replies per role and records every request.
///
/// A role with no reply left fails, like a backend that stopped answering.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: RefCell<HashMap<Role, VecDeque<Result<String, String>>>>,
    requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for `role`.
    pub fn reply(self, role: Role, text: &str) -> Self {
        self.replies
            .borrow_mut()
            .entry(role)
            .or_default()
            .push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failed call for `role`.
    pub fn fail(self, role: Role, message: &str) -> Self {
        self.replies
            .borrow_mut()
            .entry(role)
            .or_default()
            .push_back(Err(message.to_string()));
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls_for(&self, role: Role) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.role == role)
            .count()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        let next = self
            .replies
            .borrow_mut()
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted reply for {}", request.role)),
        }
    }
}

/// Wrap `body` in a fenced block the way a model would reply.
pub fn fenced(lang: &str, body: &str) -> String {
    format!("```{lang}\n{body}\n```\n")
}

/// Config whose candidates run under `sh`, with the workspace at `workspace`.
pub fn test_config(workspace: &Path) -> SolverConfig {
    SolverConfig {
        api_keys: ApiKeys {
            google: "test-api-key".to_string(),
        },
        models: Models {
            tester_agent: "test-tester".to_string(),
            brute_agent: "test-brute".to_string(),
            optimal_agent: "test-optimal".to_string(),
        },
        execution: ExecutionConfig {
            max_optimal_attempts: 3,
            timeout_seconds: 10,
            interpreter: vec!["sh".to_string()],
            generate_inputs: true,
            stderr_limit_bytes: 64 * 1024,
        },
        generator: GeneratorConfig::default(),
        output: OutputConfig {
            workspace_dir: workspace.to_path_buf(),
        },
        files: FileNames {
            test_inputs: "small_inputs.txt".to_string(),
            brute_solution: "brute.sh".to_string(),
            brute_outputs: "small_outputs.txt".to_string(),
            optimal_solution: "optimal.sh".to_string(),
            optimal_outputs: "optimal_outputs.txt".to_string(),
        },
    }
}
