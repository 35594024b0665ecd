//! Generator abstraction for source and input generation.
//!
//! The [`Generator`] trait decouples the orchestrator from the backend that
//! turns a prompt into text. [`CommandGenerator`] pipes the prompt into an
//! external command; tests use scripted generators that return canned replies
//! without spawning anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::types::Role;
use crate::io::config::SolverConfig;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Placeholder in generator arguments replaced by the role's model.
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// Parameters for one generation call.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub role: Role,
    /// Model identifier from `[models]`.
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
    /// Truncate generator output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Where the raw stdout/stderr of the call is kept.
    pub log_path: PathBuf,
}

/// Abstraction over generation backends.
pub trait Generator {
    /// Return the raw reply text for `request`.
    fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

impl<G: Generator + ?Sized> Generator for &G {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        (**self).generate(request)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generator timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),
    #[error("generator exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("generator returned an empty reply")]
    EmptyReply,
}

/// Generator that runs an external command with the prompt on stdin and reads
/// the reply from stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: Vec<String>,
    api_key: Option<String>,
    api_key_env: String,
}

impl CommandGenerator {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            api_key: None,
            api_key_env: String::new(),
        }
    }

    /// Hand `key` to the child through `env_var`. The parent environment is
    /// left untouched.
    pub fn with_api_key(mut self, env_var: &str, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self.api_key_env = env_var.to_string();
        self
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        let generator = Self::new(config.generator.command.clone());
        match config.api_key() {
            Some(key) => generator.with_api_key(&config.generator.api_key_env, key),
            None => {
                warn!("no API key configured; generator relies on its own credentials");
                generator
            }
        }
    }

    fn build_command(&self, model: &str) -> Result<Command> {
        let mut args = self
            .command
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, model));
        let program = args.next().context("generator command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(key) = &self.api_key
            && !self.api_key_env.is_empty()
        {
            cmd.env(&self.api_key_env, key);
        }
        Ok(cmd)
    }
}

impl Generator for CommandGenerator {
    #[instrument(
        skip_all,
        fields(
            role = %request.role,
            model = %request.model,
            timeout_secs = request.timeout.as_secs(),
        )
    )]
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        info!("requesting generation");
        let cmd = self.build_command(&request.model)?;
        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run generator command")?;

        write_generator_log(&request.log_path, &output, request.output_limit_bytes)?;

        if output.timed_out {
            warn!("generator timed out");
            return Err(GenerationError::TimedOut(request.timeout).into());
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(GenerationError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        if reply.trim().is_empty() {
            return Err(GenerationError::EmptyReply.into());
        }
        debug!(reply_bytes = reply.len(), "generation completed");
        Ok(reply)
    }
}

fn write_generator_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create generator log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("generator"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("generator"));
    if output.timed_out {
        buf.push_str("\n[generator timed out]\n");
    }

    if buf.len() > output_limit {
        let mut cut = output_limit;
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        let dropped = buf.len() - cut;
        buf.truncate(cut);
        buf.push_str(&format!("\n[truncated {dropped} bytes]\n"));
    }

    fs::write(path, buf).with_context(|| format!("write generator log {}", path.display()))
}
