//! Prompt pack builder for generator requests.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::types::Role;

const TESTER_TEMPLATE: &str = include_str!("prompts/tester.md");
const BRUTE_TEMPLATE: &str = include_str!("prompts/brute.md");
const OPTIMAL_TEMPLATE: &str = include_str!("prompts/optimal.md");

/// Default prompt budget in bytes.
pub const DEFAULT_PROMPT_BUDGET_BYTES: usize = 60_000;

/// Why the previous optimal attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryFeedback {
    /// Number of the rejected attempt.
    pub attempt: u32,
    pub previous_source: String,
    pub diff: String,
}

/// All inputs needed to build a prompt pack.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    /// Problem statement as given by the user.
    pub problem: String,
    /// Test input the candidate will be run against, when already known.
    pub sample_inputs: Option<String>,
    /// Present only for optimal-stage retries.
    pub feedback: Option<RetryFeedback>,
}

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("tester", TESTER_TEMPLATE)
            .context("tester template")?;
        env.add_template("brute", BRUTE_TEMPLATE)
            .context("brute template")?;
        env.add_template("optimal", OPTIMAL_TEMPLATE)
            .context("optimal template")?;
        Ok(Self { env })
    }

    fn render(&self, role: Role, input: &PromptInputs) -> Result<String> {
        let template = self.env.get_template(role.as_str())?;
        let rendered = template.render(context! {
            problem => input.problem.trim(),
            sample_inputs => input
                .sample_inputs
                .as_deref()
                .map(str::trim_end)
                .filter(|s| !s.trim().is_empty()),
            feedback => input.feedback.as_ref(),
        })?;
        Ok(rendered)
    }
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

/// Split rendered output on `<!-- section:KEY required|droppable -->` markers.
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
            .expect("section marker pattern is valid")
    });

    let markers: Vec<_> = SECTION_RE
        .captures_iter(rendered)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((
                caps.get(1)?.as_str().to_string(),
                caps.get(2)?.as_str() == "required",
                whole.start(),
                whole.end(),
            ))
        })
        .collect();

    let mut sections = Vec::new();
    for (i, (key, required, _, body_start)) in markers.iter().enumerate() {
        let end = markers
            .get(i + 1)
            .map(|(_, _, next_start, _)| *next_start)
            .unwrap_or(rendered.len());
        let content = rendered[*body_start..end].trim().to_string();
        if !content.is_empty() || *required {
            sections.push(ParsedSection {
                key: key.clone(),
                required: *required,
                content,
            });
        }
    }
    sections
}

/// Drop droppable sections (test input first, then the previous attempt) until
/// the pack fits; if required sections alone are too large, truncate the
/// longest one. Sizes include the separators [`render_sections`] inserts.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len = |secs: &[ParsedSection]| -> usize {
        let content: usize = secs.iter().map(|s| s.content.len()).sum();
        content + SECTION_SEPARATOR.len() * secs.len().saturating_sub(1)
    };

    for key in ["inputs", "previous"] {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    let total = total_len(sections);
    if total <= budget {
        return;
    }
    let Some(longest) = sections.iter_mut().max_by_key(|s| s.content.len()) else {
        return;
    };
    let marker = "\n[truncated]";
    let keep = longest
        .content
        .len()
        .saturating_sub(total - budget)
        .saturating_sub(marker.len());
    let mut cut = keep;
    while !longest.content.is_char_boundary(cut) {
        cut -= 1;
    }
    debug!(
        section = %longest.key,
        before_len = longest.content.len(),
        after_len = cut,
        "truncated section for budget"
    );
    longest.content.truncate(cut);
    longest.content.push_str(marker);
}

const SECTION_SEPARATOR: &str = "\n\n";

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Builds a prompt pack within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_BUDGET_BYTES)
    }
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build(&self, role: Role, input: &PromptInputs) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?
            .render(role, input)
            .with_context(|| format!("render {role} prompt"))?;
        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(PromptPack {
            content: render_sections(&sections),
        })
    }
}

/// A rendered prompt ready to send to a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    pub fn render(&self) -> String {
        self.content.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }
}
