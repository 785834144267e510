//! Error taxonomy for the orchestration core.
//!
//! Hand-rolled enums with manual `Display`/`Error` impls — no `thiserror`,
//! no `anyhow`.

use std::error::Error;
use std::fmt;

/// Top-level error surfaced at the `Engine` boundary.
///
/// The engine never lets this escape `process_request` — it's caught and
/// converted into a canned apology text plus a best-effort task transition
/// to `Failed`. It exists so internal components have something precise to
/// return and log before that conversion happens.
#[derive(Debug, Clone)]
pub enum OrchestratorError {
    /// Empty or malformed `user_request`. No task is created.
    InputError(String),
    /// Registry returned an empty catalog, or no invokers could be built.
    CatalogUnavailable(String),
    /// Unexpected failure in executor scaffolding (not a per-agent failure).
    WorkflowError(String),
    /// A `TaskManager` operation was rejected because it violated the task
    /// state machine (e.g. a write to a terminal task).
    StateViolation(String),
    /// The caller's cancellation token fired before completion.
    Canceled,
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::InputError(msg) => write!(f, "invalid request: {}", msg),
            OrchestratorError::CatalogUnavailable(msg) => write!(f, "no agents available: {}", msg),
            OrchestratorError::WorkflowError(msg) => write!(f, "workflow error: {}", msg),
            OrchestratorError::StateViolation(msg) => write!(f, "task state violation: {}", msg),
            OrchestratorError::Canceled => write!(f, "request canceled"),
        }
    }
}

impl Error for OrchestratorError {}

/// Failures raised by `TaskManager` when a requested transition or write
/// does not satisfy the state machine in the task data model.
#[derive(Debug, Clone)]
pub enum TaskError {
    NotFound(String),
    TerminalTask(String),
    InvalidTransition { from: &'static str, to: &'static str },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::NotFound(id) => write!(f, "task not found: {}", id),
            TaskError::TerminalTask(id) => write!(f, "task {} is in a terminal state; further writes are rejected", id),
            TaskError::InvalidTransition { from, to } => {
                write!(f, "invalid task state transition: {} -> {}", from, to)
            }
        }
    }
}

impl Error for TaskError {}

impl From<TaskError> for OrchestratorError {
    fn from(e: TaskError) -> Self {
        OrchestratorError::StateViolation(e.to_string())
    }
}
