//! Solver configuration stored in `solver.toml`.
//!
//! Required keys have no defaults: a config missing any of them is rejected
//! at load time rather than silently filled in.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ErrorKind, Role};

/// API key values that mean "not filled in yet".
pub const PLACEHOLDER_API_KEYS: &[&str] = &["your-google-api-key-here", "your-api-key-here"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConfigurationError
    }
}

/// Solver configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SolverConfig {
    pub api_keys: ApiKeys,
    pub models: Models,
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    pub output: OutputConfig,
    pub files: FileNames,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeys {
    pub google: String,
}

/// Model identifier per agent role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Models {
    pub tester_agent: String,
    pub brute_agent: String,
    pub optimal_agent: String,
}

impl Models {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Tester => &self.tester_agent,
            Role::Brute => &self.brute_agent,
            Role::Optimal => &self.optimal_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Optimal-stage generation attempts before giving up.
    pub max_optimal_attempts: u32,
    /// Per-run wall-clock limit for a candidate.
    pub timeout_seconds: u64,
    /// Command prefix used to run a candidate; the source path is appended.
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,
    /// Ask the tester agent for fresh inputs every session. When off, the
    /// existing input file is used as-is.
    #[serde(default = "default_generate_inputs")]
    pub generate_inputs: bool,
    /// Bytes of candidate stderr kept for error messages.
    #[serde(default = "default_stderr_limit_bytes")]
    pub stderr_limit_bytes: usize,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_interpreter() -> Vec<String> {
    vec!["python3".to_string()]
}

fn default_generate_inputs() -> bool {
    true
}

fn default_stderr_limit_bytes() -> usize {
    64 * 1024
}

/// External command that answers generation prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Argv; `{model}` in any argument is replaced with the role's model.
    pub command: Vec<String>,
    pub timeout_seconds: u64,
    /// Environment variable the API key is handed to the command through.
    pub api_key_env: String,
    /// Truncate generator stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string(), "-m".to_string(), "{model}".to_string()],
            timeout_seconds: 5 * 60,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            output_limit_bytes: 1_000_000,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    pub workspace_dir: PathBuf,
}

/// Artifact file names inside the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileNames {
    pub test_inputs: String,
    pub brute_solution: String,
    pub brute_outputs: String,
    pub optimal_solution: String,
    pub optimal_outputs: String,
}

impl FileNames {
    fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("test_inputs", &self.test_inputs),
            ("brute_solution", &self.brute_solution),
            ("brute_outputs", &self.brute_outputs),
            ("optimal_solution", &self.optimal_solution),
            ("optimal_outputs", &self.optimal_outputs),
        ]
    }
}

impl SolverConfig {
    /// API key, or `None` when empty or still a template placeholder.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_keys.google.trim();
        if key.is_empty() || PLACEHOLDER_API_KEYS.contains(&key) {
            None
        } else {
            Some(key)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.max_optimal_attempts == 0 {
            return Err(invalid("execution.max_optimal_attempts must be > 0"));
        }
        if self.execution.timeout_seconds == 0 {
            return Err(invalid("execution.timeout_seconds must be > 0"));
        }
        if self.execution.stderr_limit_bytes == 0 {
            return Err(invalid("execution.stderr_limit_bytes must be > 0"));
        }
        if is_blank_command(&self.execution.interpreter) {
            return Err(invalid("execution.interpreter must be a non-empty array"));
        }
        if is_blank_command(&self.generator.command) {
            return Err(invalid("generator.command must be a non-empty array"));
        }
        if self.generator.timeout_seconds == 0 {
            return Err(invalid("generator.timeout_seconds must be > 0"));
        }
        if self.generator.output_limit_bytes == 0 {
            return Err(invalid("generator.output_limit_bytes must be > 0"));
        }
        if self.output.workspace_dir.as_os_str().is_empty() {
            return Err(invalid("output.workspace_dir must not be empty"));
        }
        for (key, name) in self.files.entries() {
            if name.trim().is_empty() {
                return Err(invalid(&format!("files.{key} must not be empty")));
            }
            if Path::new(name).components().count() != 1 {
                return Err(invalid(&format!("files.{key} must be a plain file name")));
            }
        }
        let mut names: Vec<&str> = self.files.entries().iter().map(|(_, n)| *n).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("files entries must be distinct"));
        }
        Ok(())
    }
}

fn is_blank_command(command: &[String]) -> bool {
    command.first().is_none_or(|program| program.trim().is_empty())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

/// Parse and validate config text. `path` is only used for error messages.
pub fn parse_config(contents: &str, path: &Path) -> Result<SolverConfig, ConfigError> {
    let cfg: SolverConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from a TOML file. A missing file is an error.
pub fn load_config(path: &Path) -> Result<SolverConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::init::CONFIG_TEMPLATE;

    const SAMPLE: &str = r#"
[api_keys]
google = "test-api-key"

[models]
tester_agent = "google:gemini-2.5-flash-lite"
brute_agent = "google:gemini-2.5-flash-lite"
optimal_agent = "google:gemini-2.5-flash-lite"

[execution]
max_optimal_attempts = 3
timeout_seconds = 10

[output]
workspace_dir = "workspace"

[files]
test_inputs = "small_inputs.txt"
brute_solution = "brute.py"
brute_outputs = "small_outputs.txt"
optimal_solution = "optimal.py"
optimal_outputs = "op.txt"
"#;

    fn sample_path() -> PathBuf {
        PathBuf::from("solver.toml")
    }

    #[test]
    fn parses_required_keys_and_defaults_optional_ones() {
        let cfg = parse_config(SAMPLE, &sample_path()).expect("parse");
        assert_eq!(cfg.execution.max_optimal_attempts, 3);
        assert_eq!(cfg.execution.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.execution.interpreter, vec!["python3"]);
        assert!(cfg.execution.generate_inputs);
        assert_eq!(cfg.generator, GeneratorConfig::default());
        assert_eq!(cfg.files.optimal_outputs, "op.txt");
        assert_eq!(cfg.models.for_role(Role::Brute), "google:gemini-2.5-flash-lite");
        assert_eq!(cfg.api_key(), Some("test-api-key"));
    }

    #[test]
    fn placeholder_api_key_counts_as_absent() {
        let raw = SAMPLE.replace("test-api-key", "your-google-api-key-here");
        let cfg = parse_config(&raw, &sample_path()).expect("parse");
        assert_eq!(cfg.api_key(), None);
    }

    #[test]
    fn missing_required_section_is_configuration_error() {
        let err = parse_config("invalid = \"config\"\n", &sample_path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn missing_required_key_names_the_key() {
        let raw = SAMPLE.replace("timeout_seconds = 10\n", "");
        let err = parse_config(&raw, &sample_path()).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"), "{err}");
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let raw = SAMPLE.replace("max_optimal_attempts = 3", "max_optimal_attempts = 0");
        let err = parse_config(&raw, &sample_path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn nested_or_duplicate_file_names_are_rejected() {
        let raw = SAMPLE.replace("\"op.txt\"", "\"../op.txt\"");
        assert!(parse_config(&raw, &sample_path()).is_err());
        let raw = SAMPLE.replace("\"op.txt\"", "\"small_outputs.txt\"");
        let err = parse_config(&raw, &sample_path()).unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nonexistent_config.toml");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(err.to_string().contains("nonexistent_config.toml"));
    }

    #[test]
    fn template_parses() {
        let cfg = parse_config(CONFIG_TEMPLATE, &sample_path()).expect("template");
        assert_eq!(cfg.api_key(), None);
    }
}
