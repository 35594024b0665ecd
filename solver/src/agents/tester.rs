//! Tester agent: produces the shared test input file.

use std::path::Path;

use anyhow::Result;

use crate::core::types::Role;
use crate::io::generator::Generator;
use crate::io::prompt::PromptInputs;

use super::{AgentSettings, generate_source};

#[derive(Debug, Clone)]
pub struct TesterAgent {
    model: String,
    settings: AgentSettings,
}

impl TesterAgent {
    pub fn new(model: &str, settings: AgentSettings) -> Self {
        Self {
            model: model.to_string(),
            settings,
        }
    }

    /// Return the contents of a test input file for `problem`.
    pub fn run<G: Generator>(
        &self,
        generator: &G,
        problem: &str,
        log_path: &Path,
    ) -> Result<String> {
        let inputs = PromptInputs {
            problem: problem.to_string(),
            ..PromptInputs::default()
        };
        generate_source(
            generator,
            Role::Tester,
            &self.model,
            &self.settings,
            &inputs,
            log_path,
        )
    }
}
