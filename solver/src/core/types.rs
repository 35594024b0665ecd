//! Shared deterministic types for the solver pipeline.
//!
//! These types define stable contracts between the executor, comparator and
//! orchestrator. They carry no I/O and serialize with stable snake_case names.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which generative agent a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tester,
    Brute,
    Optimal,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Tester => "tester",
            Role::Brute => "brute",
            Role::Optimal => "optimal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of a solving session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Test-input generation (only when inputs are missing and generation is enabled).
    Inputs,
    /// Brute-force baseline that produces the reference outputs.
    Brute,
    /// Optimized solution validated against the reference.
    Optimal,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Inputs => "inputs",
            Stage::Brute => "brute",
            Stage::Optimal => "optimal",
        }
    }

    pub fn role(self) -> Role {
        match self {
            Stage::Inputs => Role::Tester,
            Stage::Brute => Role::Brute,
            Stage::Optimal => Role::Optimal,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of failure kinds a session can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CodeFileNotFound,
    InputFileNotFound,
    Timeout,
    RuntimeError,
    GenerationFailure,
    ConfigurationError,
    ConvergenceFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CodeFileNotFound => "code_file_not_found",
            ErrorKind::InputFileNotFound => "input_file_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RuntimeError => "runtime_error",
            ErrorKind::GenerationFailure => "generation_failure",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::ConvergenceFailure => "convergence_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated source attempt for a stage.
///
/// Each retry produces a new candidate; candidates are never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionCandidate {
    pub stage: Stage,
    /// 1-indexed attempt number within the stage.
    pub attempt: u32,
    pub source: String,
    pub path: PathBuf,
}

/// Coarse exit classification of a candidate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitClass {
    Ok,
    NotFound,
    Timeout,
    RuntimeError,
}

/// Detailed outcome of a candidate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Ok,
    CodeFileNotFound,
    InputFileNotFound,
    Timeout,
    /// Non-zero exit, death by signal, or the interpreter could not be started.
    RuntimeError { exit_code: Option<i32> },
}

impl ExecOutcome {
    pub fn class(self) -> ExitClass {
        match self {
            ExecOutcome::Ok => ExitClass::Ok,
            ExecOutcome::CodeFileNotFound | ExecOutcome::InputFileNotFound => {
                ExitClass::NotFound
            }
            ExecOutcome::Timeout => ExitClass::Timeout,
            ExecOutcome::RuntimeError { .. } => ExitClass::RuntimeError,
        }
    }

    /// Session error kind for a failed run; `None` on success.
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            ExecOutcome::Ok => None,
            ExecOutcome::CodeFileNotFound => Some(ErrorKind::CodeFileNotFound),
            ExecOutcome::InputFileNotFound => Some(ErrorKind::InputFileNotFound),
            ExecOutcome::Timeout => Some(ErrorKind::Timeout),
            ExecOutcome::RuntimeError { .. } => Some(ErrorKind::RuntimeError),
        }
    }
}

/// Result of running one candidate against one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: ExecOutcome,
    /// Where stdout was captured. Only meaningful when the run succeeded.
    pub output_path: PathBuf,
    /// Human-readable failure description; empty on success.
    pub error: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.outcome == ExecOutcome::Ok
    }

    /// The `(success, error)` pair callers that only need a verdict consume.
    pub fn into_pair(self) -> (bool, String) {
        (self.success(), self.error)
    }
}

/// Comparator outcome for one expected/actual pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub matched: bool,
    /// Present only on mismatch.
    pub diff: Option<String>,
}

impl Verdict {
    pub fn matched() -> Self {
        Self {
            matched: true,
            diff: None,
        }
    }

    pub fn mismatch(diff: String) -> Self {
        Self {
            matched: false,
            diff: Some(diff),
        }
    }
}
