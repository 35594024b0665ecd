//! Solution agent for the brute and optimal stages.

use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::types::Role;
use crate::io::generator::Generator;
use crate::io::prompt::PromptInputs;

use super::{AgentSettings, generate_source};

/// Asks a generator for a complete program and extracts its source.
#[derive(Debug, Clone)]
pub struct SolutionAgent {
    role: Role,
    model: String,
    settings: AgentSettings,
}

impl SolutionAgent {
    pub fn new(role: Role, model: &str, settings: AgentSettings) -> Result<Self> {
        if role == Role::Tester {
            return Err(anyhow!("solution agent cannot take the tester role"));
        }
        Ok(Self {
            role,
            model: model.to_string(),
            settings,
        })
    }

    pub fn run<G: Generator>(
        &self,
        generator: &G,
        inputs: &PromptInputs,
        log_path: &Path,
    ) -> Result<String> {
        generate_source(
            generator,
            self.role,
            &self.model,
            &self.settings,
            inputs,
            log_path,
        )
    }
}
