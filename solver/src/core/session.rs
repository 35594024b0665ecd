//! Session state machine for the brute-then-optimal pipeline.
//!
//! The machine is pure: the orchestrator performs the side effect belonging to
//! the current state, reports what happened as an [`Event`], and the machine
//! decides the next state. The optimal-stage attempt budget lives here so the
//! `attempts <= max` bound is enforced in one place.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::core::budget::AttemptBudget;
use crate::core::types::{ErrorKind, Stage};

/// Terminal failure recorded by the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    /// Optimal-stage generations spent when the session failed.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Init,
    GeneratingInputs,
    GeneratingBrute,
    ExecutingBrute,
    ValidatingBrute,
    GeneratingOptimal { attempt: u32 },
    ExecutingOptimal { attempt: u32 },
    ValidatingOptimal { attempt: u32 },
    Done { attempts: u32 },
    Failed(Failure),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done { .. } | SessionState::Failed(_))
    }

    /// Stage the state belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionState::GeneratingInputs => Some(Stage::Inputs),
            SessionState::GeneratingBrute
            | SessionState::ExecutingBrute
            | SessionState::ValidatingBrute => Some(Stage::Brute),
            SessionState::GeneratingOptimal { .. }
            | SessionState::ExecutingOptimal { .. }
            | SessionState::ValidatingOptimal { .. } => Some(Stage::Optimal),
            SessionState::Init | SessionState::Done { .. } => None,
            SessionState::Failed(failure) => Some(failure.stage),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Init => write!(f, "init"),
            SessionState::GeneratingInputs => write!(f, "generating_inputs"),
            SessionState::GeneratingBrute => write!(f, "generating_brute"),
            SessionState::ExecutingBrute => write!(f, "executing_brute"),
            SessionState::ValidatingBrute => write!(f, "validating_brute"),
            SessionState::GeneratingOptimal { attempt } => {
                write!(f, "generating_optimal[{attempt}]")
            }
            SessionState::ExecutingOptimal { attempt } => write!(f, "executing_optimal[{attempt}]"),
            SessionState::ValidatingOptimal { attempt } => {
                write!(f, "validating_optimal[{attempt}]")
            }
            SessionState::Done { attempts } => write!(f, "done[{attempts}]"),
            SessionState::Failed(failure) => {
                write!(f, "failed[{}:{}]", failure.stage, failure.kind)
            }
        }
    }
}

/// What happened while the orchestrator handled the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Session initialized; `needs_inputs` requests the inputs stage.
    Start { needs_inputs: bool },
    /// The generator produced an artifact and it was written to the workspace.
    Generated,
    GenerationFailed { message: String },
    /// The candidate ran to a zero exit before its deadline.
    Executed,
    ExecutionFailed { kind: ErrorKind, message: String },
    /// The candidate's output was accepted.
    Matched,
    /// The candidate's output differs from the reference.
    Mismatched { diff: String },
}

/// Finite-state machine over (stage, attempt).
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    budget: AttemptBudget,
}

impl SessionMachine {
    pub fn new(max_optimal_attempts: u32) -> Self {
        Self {
            state: SessionState::Init,
            budget: AttemptBudget::new(max_optimal_attempts),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn budget(&self) -> &AttemptBudget {
        &self.budget
    }

    /// Apply an event and return the new state.
    ///
    /// Events that make no sense for the current state are rejected and leave
    /// the machine unchanged.
    pub fn apply(&mut self, event: Event) -> Result<&SessionState> {
        let next = self.next_state(event)?;
        self.state = next;
        Ok(&self.state)
    }

    fn next_state(&mut self, event: Event) -> Result<SessionState> {
        let state = self.state.clone();
        let attempts = self.budget.used();
        let next = match (state, event) {
            (SessionState::Init, Event::Start { needs_inputs: true }) => {
                SessionState::GeneratingInputs
            }
            (SessionState::Init, Event::Start { needs_inputs: false }) => {
                SessionState::GeneratingBrute
            }

            (SessionState::GeneratingInputs, Event::Generated) => SessionState::GeneratingBrute,
            (SessionState::GeneratingBrute, Event::Generated) => SessionState::ExecutingBrute,
            (SessionState::GeneratingOptimal { attempt }, Event::Generated) => {
                SessionState::ExecutingOptimal { attempt }
            }
            (
                state @ (SessionState::GeneratingInputs
                | SessionState::GeneratingBrute
                | SessionState::GeneratingOptimal { .. }),
                Event::GenerationFailed { message },
            ) => fail(&state, ErrorKind::GenerationFailure, message, attempts)?,

            (SessionState::ExecutingBrute, Event::Executed) => SessionState::ValidatingBrute,
            (SessionState::ExecutingOptimal { attempt }, Event::Executed) => {
                SessionState::ValidatingOptimal { attempt }
            }
            (
                state @ (SessionState::ExecutingBrute
                | SessionState::ValidatingBrute
                | SessionState::ExecutingOptimal { .. }),
                Event::ExecutionFailed { kind, message },
            ) => fail(&state, kind, message, attempts)?,

            (SessionState::ValidatingBrute, Event::Matched) => self.begin_optimal_attempt()?,
            (SessionState::ValidatingOptimal { attempt }, Event::Matched) => {
                SessionState::Done { attempts: attempt }
            }
            (SessionState::ValidatingOptimal { attempt }, Event::Mismatched { diff }) => {
                if self.budget.is_exhausted() {
                    SessionState::Failed(Failure {
                        stage: Stage::Optimal,
                        kind: ErrorKind::ConvergenceFailure,
                        message: diff,
                        attempts: attempt,
                    })
                } else {
                    self.begin_optimal_attempt()?
                }
            }

            (state, event) => {
                return Err(anyhow!("invalid session transition: {state} on {event:?}"));
            }
        };
        Ok(next)
    }

    fn begin_optimal_attempt(&mut self) -> Result<SessionState> {
        if self.budget.is_exhausted() {
            // Only reachable with a zero budget.
            return Ok(SessionState::Failed(Failure {
                stage: Stage::Optimal,
                kind: ErrorKind::ConvergenceFailure,
                message: "no optimal attempts configured".to_string(),
                attempts: 0,
            }));
        }
        let attempt = self.budget.consume()?;
        Ok(SessionState::GeneratingOptimal { attempt })
    }
}

fn fail(
    state: &SessionState,
    kind: ErrorKind,
    message: String,
    attempts: u32,
) -> Result<SessionState> {
    let stage = state
        .stage()
        .ok_or_else(|| anyhow!("state {state} has no stage"))?;
    Ok(SessionState::Failed(Failure {
        stage,
        kind,
        message,
        attempts,
    }))
}
