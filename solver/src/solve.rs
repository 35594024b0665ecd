//! Session orchestrator for `solver solve`.
//!
//! Drives one [`SessionMachine`] to a terminal state: for each non-terminal
//! state it performs the matching side effect (generate, execute, validate),
//! turns the result into an [`Event`], and lets the machine pick the next
//! state. Artifacts land in the workspace and are overwritten per attempt.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::agents::AgentSettings;
use crate::agents::solution::SolutionAgent;
use crate::agents::tester::TesterAgent;
use crate::core::session::{Event, SessionMachine, SessionState};
use crate::core::types::{ErrorKind, Role, SolutionCandidate, Stage};
use crate::exit_codes;
use crate::io::compare::OutputComparator;
use crate::io::config::{SolverConfig, load_config};
use crate::io::executor::CodeExecutor;
use crate::io::generator::{CommandGenerator, Generator};
use crate::io::prompt::{DEFAULT_PROMPT_BUDGET_BYTES, PromptInputs, RetryFeedback};
use crate::io::workspace::{ArtifactPaths, Workspace};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The optimal candidate matched the reference.
    Success { attempts: u32 },
    /// A stage failed for a structural reason; never retried.
    StageFailed {
        stage: Stage,
        kind: ErrorKind,
        message: String,
    },
    /// Every optimal attempt disagreed with the reference.
    ConvergenceFailure { attempts: u32, last_diff: String },
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Success { .. } => exit_codes::OK,
            SessionOutcome::StageFailed {
                kind: ErrorKind::GenerationFailure | ErrorKind::ConfigurationError,
                ..
            } => exit_codes::INVALID,
            SessionOutcome::StageFailed { .. } => exit_codes::FAILED,
            SessionOutcome::ConvergenceFailure { .. } => exit_codes::NOT_CONVERGED,
        }
    }
}

/// Generation calls made during a session, per role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationCounts {
    pub tester: u32,
    pub brute: u32,
    pub optimal: u32,
}

impl GenerationCounts {
    fn record(&mut self, role: Role) {
        match role {
            Role::Tester => self.tester += 1,
            Role::Brute => self.brute += 1,
            Role::Optimal => self.optimal += 1,
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    #[serde(flatten)]
    pub outcome: SessionOutcome,
    pub workspace: PathBuf,
    pub artifacts: ArtifactPaths,
    pub generations: GenerationCounts,
    pub duration_ms: u64,
}

/// Mutable per-session bookkeeping the machine does not track.
#[derive(Debug, Default)]
struct SessionLog {
    generations: GenerationCounts,
    /// Most recent optimal candidate.
    candidate: Option<SolutionCandidate>,
    feedback: Option<RetryFeedback>,
}

/// Sequences generation, execution and comparison for one problem.
pub struct Orchestrator<G: Generator> {
    config: SolverConfig,
    workspace: Workspace,
    executor: CodeExecutor,
    comparator: OutputComparator,
    generator: G,
    settings: AgentSettings,
}

impl Orchestrator<CommandGenerator> {
    /// Load `config_path` and build an orchestrator with the command-line
    /// generator. A relative workspace resolves against the config's directory.
    pub fn from_config_path(config_path: &Path) -> Result<Self> {
        let mut config = load_config(config_path)?;
        if config.output.workspace_dir.is_relative()
            && let Some(parent) = config_path.parent()
        {
            config.output.workspace_dir = parent.join(&config.output.workspace_dir);
        }
        let generator = CommandGenerator::from_config(&config);
        Self::new(config, generator)
    }
}

impl<G: Generator> Orchestrator<G> {
    /// Validate `config` and create the workspace.
    pub fn new(config: SolverConfig, generator: G) -> Result<Self> {
        config.validate()?;
        let workspace = Workspace::create(&config.output.workspace_dir, &config.files)?;
        let executor = CodeExecutor::new(config.execution.interpreter.clone())
            .with_stderr_limit(config.execution.stderr_limit_bytes);
        let settings = AgentSettings {
            prompt_budget_bytes: DEFAULT_PROMPT_BUDGET_BYTES,
            output_limit_bytes: config.generator.output_limit_bytes,
            timeout: config.generator.timeout(),
        };
        Ok(Self {
            config,
            workspace,
            executor,
            comparator: OutputComparator::default(),
            generator,
            settings,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run a full session for `problem`.
    ///
    /// Returns `Err` only for unexpected I/O failures; every modeled failure
    /// is reported through [`SessionOutcome`].
    #[instrument(
        skip_all,
        fields(
            workspace = %self.workspace.dir().display(),
            max_attempts = self.config.execution.max_optimal_attempts,
        )
    )]
    pub fn solve(&self, problem: &str) -> Result<SessionReport> {
        let started = Instant::now();
        let paths = self.workspace.paths();
        let mut machine = SessionMachine::new(self.config.execution.max_optimal_attempts);
        let mut log = SessionLog::default();

        // Inputs left by an earlier session may belong to another problem.
        let needs_inputs = self.config.execution.generate_inputs;
        if !needs_inputs && !paths.test_inputs.exists() {
            warn!(
                path = %paths.test_inputs.display(),
                "test inputs missing and generation disabled"
            );
        }
        machine.apply(Event::Start { needs_inputs })?;

        loop {
            let state = machine.state().clone();
            debug!(state = %state, "session step");
            let event = match state {
                SessionState::GeneratingInputs => self.generate_inputs(problem, &mut log)?,
                SessionState::GeneratingBrute => self.generate_brute(problem, &mut log)?,
                SessionState::ExecutingBrute => {
                    self.execute(&paths.brute_solution, &paths.brute_outputs)
                }
                SessionState::ValidatingBrute => self.validate_brute(),
                SessionState::GeneratingOptimal { attempt } => {
                    self.generate_optimal(problem, attempt, &mut log)?
                }
                SessionState::ExecutingOptimal { .. } => {
                    self.execute(&paths.optimal_solution, &paths.optimal_outputs)
                }
                SessionState::ValidatingOptimal { attempt } => {
                    self.validate_optimal(attempt, &mut log)
                }
                SessionState::Done { .. } | SessionState::Failed(_) => break,
                SessionState::Init => return Err(anyhow!("session did not start")),
            };
            machine.apply(event)?;
        }

        let outcome = match machine.state() {
            SessionState::Done { attempts } => SessionOutcome::Success {
                attempts: *attempts,
            },
            SessionState::Failed(failure) if failure.kind == ErrorKind::ConvergenceFailure => {
                SessionOutcome::ConvergenceFailure {
                    attempts: failure.attempts,
                    last_diff: failure.message.clone(),
                }
            }
            SessionState::Failed(failure) => SessionOutcome::StageFailed {
                stage: failure.stage,
                kind: failure.kind,
                message: failure.message.clone(),
            },
            state => return Err(anyhow!("session stopped in non-terminal state {state}")),
        };
        info!(
            outcome = ?outcome,
            generations = ?log.generations,
            optimal_attempts = machine.budget().used(),
            "session finished"
        );

        Ok(SessionReport {
            outcome,
            workspace: self.workspace.dir().to_path_buf(),
            artifacts: paths.clone(),
            generations: log.generations,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    fn generate_inputs(&self, problem: &str, log: &mut SessionLog) -> Result<Event> {
        let agent = TesterAgent::new(
            self.config.models.for_role(Role::Tester),
            self.settings.clone(),
        );
        log.generations.record(Role::Tester);
        let reply = agent.run(
            &self.generator,
            problem,
            &self.workspace.generator_log_path(Role::Tester),
        );
        let inputs = match reply {
            Ok(inputs) => inputs,
            Err(err) => return Ok(generation_failed(Role::Tester, &err)),
        };
        self.workspace
            .write_artifact(&self.workspace.paths().test_inputs, &inputs)?;
        info!(bytes = inputs.len(), "wrote generated test inputs");
        Ok(Event::Generated)
    }

    fn generate_brute(&self, problem: &str, log: &mut SessionLog) -> Result<Event> {
        let inputs = PromptInputs {
            problem: problem.to_string(),
            sample_inputs: self.read_test_inputs(),
            feedback: None,
        };
        let path = self.workspace.paths().brute_solution.clone();
        match self.generate_candidate(Stage::Brute, 1, &inputs, &path, log)? {
            Ok(_) => Ok(Event::Generated),
            Err(event) => Ok(event),
        }
    }

    fn generate_optimal(
        &self,
        problem: &str,
        attempt: u32,
        log: &mut SessionLog,
    ) -> Result<Event> {
        let inputs = PromptInputs {
            problem: problem.to_string(),
            sample_inputs: self.read_test_inputs(),
            feedback: log.feedback.clone(),
        };
        let path = self.workspace.paths().optimal_solution.clone();
        match self.generate_candidate(Stage::Optimal, attempt, &inputs, &path, log)? {
            Ok(candidate) => {
                log.candidate = Some(candidate);
                Ok(Event::Generated)
            }
            Err(event) => Ok(event),
        }
    }

    /// Generate and write one candidate. The inner `Err` carries the
    /// generation-failure event; the outer one is an I/O error.
    #[instrument(skip_all, fields(stage = %stage, attempt))]
    fn generate_candidate(
        &self,
        stage: Stage,
        attempt: u32,
        inputs: &PromptInputs,
        path: &Path,
        log: &mut SessionLog,
    ) -> Result<std::result::Result<SolutionCandidate, Event>> {
        let role = stage.role();
        let model = self.config.models.for_role(role);
        let agent = SolutionAgent::new(role, model, self.settings.clone())?;
        log.generations.record(role);
        let source = match agent.run(
            &self.generator,
            inputs,
            &self.workspace.generator_log_path(role),
        ) {
            Ok(source) => source,
            Err(err) => return Ok(Err(generation_failed(role, &err))),
        };
        self.workspace.write_artifact(path, &source)?;
        info!(path = %path.display(), bytes = source.len(), "wrote candidate");
        Ok(Ok(SolutionCandidate {
            stage,
            attempt,
            source,
            path: path.to_path_buf(),
        }))
    }

    fn execute(&self, source: &Path, output: &Path) -> Event {
        let result = self.executor.execute(
            source,
            &self.workspace.paths().test_inputs,
            output,
            self.config.execution.timeout(),
        );
        match result.outcome.error_kind() {
            None => Event::Executed,
            Some(kind) => {
                warn!(source = %source.display(), kind = %kind, "candidate run failed");
                Event::ExecutionFailed {
                    kind,
                    message: result.error,
                }
            }
        }
    }

    fn validate_brute(&self) -> Event {
        let reference = &self.workspace.paths().brute_outputs;
        if reference.is_file() {
            info!(path = %reference.display(), "brute outputs accepted as reference");
            Event::Matched
        } else {
            Event::ExecutionFailed {
                kind: ErrorKind::RuntimeError,
                message: format!("Reference output missing: {}", reference.display()),
            }
        }
    }

    fn validate_optimal(&self, attempt: u32, log: &mut SessionLog) -> Event {
        let paths = self.workspace.paths();
        let verdict = self
            .comparator
            .verdict(&paths.brute_outputs, &paths.optimal_outputs);
        if verdict.matched {
            info!(attempt, "optimal output matches reference");
            return Event::Matched;
        }
        let diff = verdict.diff.unwrap_or_else(|| {
            self.comparator
                .diff_summary(&paths.brute_outputs, &paths.optimal_outputs)
        });
        warn!(attempt, "optimal output differs from reference");
        log.feedback = Some(RetryFeedback {
            attempt,
            previous_source: log
                .candidate
                .as_ref()
                .map(|c| c.source.clone())
                .unwrap_or_default(),
            diff: diff.clone(),
        });
        Event::Mismatched { diff }
    }

    fn read_test_inputs(&self) -> Option<String> {
        let path = &self.workspace.paths().test_inputs;
        match fs::read(path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => {
                debug!(
                    path = %path.display(),
                    err = %err,
                    "test inputs unavailable for prompt"
                );
                None
            }
        }
    }
}

fn generation_failed(role: Role, err: &anyhow::Error) -> Event {
    warn!(role = %role, err = %format!("{err:#}"), "generation failed");
    Event::GenerationFailed {
        message: format!("{role} generation failed: {err:#}"),
    }
}

/// Read the problem statement, rejecting an empty file.
pub fn read_problem(path: &Path) -> Result<String> {
    let problem = fs::read_to_string(path)
        .with_context(|| format!("read problem statement {}", path.display()))?;
    if problem.trim().is_empty() {
        return Err(anyhow!("problem statement {} is empty", path.display()));
    }
    Ok(problem)
}
