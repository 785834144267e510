//! Durable per-task message log and status state machine.
//!
//! A task's `history` is append-only; state transitions are validated
//! against a fixed table before being applied, and a terminal task rejects
//! any further writes outright.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::TaskError;
use super::types::{AgentMessage, AgentTask, MessagePart, MessageRole, TaskState};

/// Parameters for [`TaskManager::send_message`] — covers both the local
/// "append a user message to my own task" path and the remote "hand a
/// message to another agent's task" path used by [`super::invoker::RemoteAgentInvoker`].
#[derive(Debug, Clone)]
pub struct SendMessageParams {
    pub agent_id: String,
    pub context_id: String,
    pub task_id: Option<String>,
    pub text: String,
}

/// Result of a [`TaskManager::send_message`] call: either the task as a
/// whole (caller should inspect `state`) or a single message when the
/// callee is stateless.
pub enum SendMessageResult {
    Task(AgentTask),
    Message(AgentMessage),
}

fn state_name(state: TaskState) -> &'static str {
    match state {
        TaskState::Working => "Working",
        TaskState::InputRequired => "InputRequired",
        TaskState::Completed => "Completed",
        TaskState::Failed => "Failed",
        TaskState::Canceled => "Canceled",
    }
}

/// Validates a requested transition against the state machine in §3.
/// Returns `Ok(())` when the transition is legal, `Err` otherwise.
fn validate_transition(from: TaskState, to: TaskState) -> Result<(), TaskError> {
    use TaskState::*;
    let ok = matches!(
        (from, to),
        (Working, Working)
            | (Working, InputRequired)
            | (InputRequired, Working)
            | (Working, Completed)
            | (Working, Failed)
            | (Working, Canceled)
            | (InputRequired, Canceled)
    );
    if ok {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition {
            from: state_name(from),
            to: state_name(to),
        })
    }
}

/// Durable per-task message log with status state machine.
///
/// Implementations must be internally thread-safe; the engine holds no
/// long-lived locks across a `TaskManager` call.
#[async_trait]
pub trait TaskManager: Send + Sync {
    async fn create_task(&self, session_id: Option<String>, task_id: Option<String>) -> AgentTask;

    async fn get_task(&self, task_id: &str) -> Option<AgentTask>;

    /// Append a message and/or transition state. `final_` marks the task
    /// terminal if `state` is `Completed`/`Failed`/`Canceled` — further
    /// writes after a terminal state are rejected.
    async fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<AgentMessage>,
    ) -> Result<AgentTask, TaskError>;

    async fn send_message(
        &self,
        params: SendMessageParams,
    ) -> Result<SendMessageResult, Box<dyn Error + Send + Sync>>;
}

/// In-memory reference `TaskManager`. Persistence beyond process lifetime is
/// a caller concern per §1 ("Auth, key management, configuration
/// persistence" and the remote transport are both explicitly out of scope).
#[derive(Default)]
pub struct InMemoryTaskManager {
    tasks: RwLock<HashMap<String, AgentTask>>,
}

impl InMemoryTaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message to `task_id`, transitioning
    /// `Working`/`InputRequired` -> `Working` per §3. Used by the engine at
    /// the start of a request (step 3 of §4.9) and by callers replying to a
    /// clarification.
    pub async fn append_user_message(&self, task_id: &str, text: &str) -> Result<AgentTask, TaskError> {
        let message = AgentMessage {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            task_id: task_id.to_string(),
            context_id: self
                .get_task(task_id)
                .await
                .map(|t| t.context_id)
                .unwrap_or_default(),
            parts: vec![MessagePart { text: text.to_string() }],
            created_at: Utc::now(),
        };
        self.update_status(task_id, TaskState::Working, Some(message)).await
    }
}

#[async_trait]
impl TaskManager for InMemoryTaskManager {
    async fn create_task(&self, session_id: Option<String>, task_id: Option<String>) -> AgentTask {
        let id = task_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();
        let task = AgentTask {
            id: id.clone(),
            context_id: session_id.unwrap_or_else(|| id.clone()),
            state: TaskState::Working,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.insert(id, task.clone());
        task
    }

    async fn get_task(&self, task_id: &str) -> Option<AgentTask> {
        self.tasks.read().await.get(task_id).cloned()
    }

    async fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        message: Option<AgentMessage>,
    ) -> Result<AgentTask, TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.state.is_terminal() {
            return Err(TaskError::TerminalTask(task_id.to_string()));
        }

        validate_transition(task.state, state)?;

        if let Some(message) = message {
            task.history.push(message);
        }
        task.state = state;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn send_message(
        &self,
        params: SendMessageParams,
    ) -> Result<SendMessageResult, Box<dyn Error + Send + Sync>> {
        let task_id = match params.task_id {
            Some(id) => id,
            None => self
                .create_task(Some(params.context_id.clone()), None)
                .await
                .id,
        };
        let message = AgentMessage {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            task_id: task_id.clone(),
            context_id: params.context_id,
            parts: vec![MessagePart { text: params.text }],
            created_at: Utc::now(),
        };
        let task = self
            .update_status(&task_id, TaskState::Completed, Some(message))
            .await?;
        Ok(SendMessageResult::Task(task))
    }
}

/// Convenience alias used where call sites just need a shared handle.
pub type SharedTaskManager = Arc<dyn TaskManager>;
