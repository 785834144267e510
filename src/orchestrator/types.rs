//! Shared data types passed between the router, dispatcher, and aggregator.
//!
//! These mirror the wire/persisted shapes in the engine's external
//! interfaces: nothing here owns I/O, it's plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptor of a registered agent, as handed out by the agent registry.
///
/// Immutable for the lifetime of a single request — the router takes a
/// snapshot of the catalog at the start of routing and never re-fetches
/// mid-call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Unique name; compared case-insensitively everywhere.
    pub name: String,
    pub description: String,
    /// Presence implies the agent is reachable only through a remote
    /// invoker (task protocol), not in-process.
    pub url: Option<String>,
    pub capabilities: AgentCapabilities,
    pub skill_examples: Vec<String>,
}

impl AgentCard {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: None,
            capabilities: AgentCapabilities::default(),
            skill_examples: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_skill_examples(mut self, examples: Vec<String>) -> Self {
        self.skill_examples = examples;
        self
    }

    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push: bool,
    pub state_history: bool,
}

/// One `{agent_id, instruction}` pair inside an [`AgentChoice`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstruction {
    pub agent_id: String,
    pub instruction: String,
}

/// Router output: which agent(s) to dispatch to, and why.
///
/// Invariants enforced by `RouterExecutor` before this leaves the router:
/// `agent_id` is never present in `additional_agents`, and every dispatched
/// agent has a matching entry in `agent_instructions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentChoice {
    pub agent_id: String,
    pub confidence: f32,
    pub reasoning: String,
    pub additional_agents: Option<Vec<String>>,
    pub agent_instructions: Vec<AgentInstruction>,
}

impl AgentChoice {
    /// True when this choice is asking the user a clarifying question
    /// rather than naming a dispatchable agent capability.
    pub fn is_clarification(&self, clarification_agent_id: &str) -> bool {
        self.agent_id.eq_ignore_ascii_case(clarification_agent_id)
    }

    pub fn instruction_for(&self, agent_id: &str) -> Option<&str> {
        self.agent_instructions
            .iter()
            .find(|i| i.agent_id.eq_ignore_ascii_case(agent_id))
            .map(|i| i.instruction.as_str())
    }

    /// `[agent_id] ++ (additional_agents \ {agent_id})`, preserving order.
    pub fn dispatch_order(&self) -> Vec<String> {
        let mut ordered = vec![self.agent_id.clone()];
        if let Some(extra) = &self.additional_agents {
            for id in extra {
                if !id.eq_ignore_ascii_case(&self.agent_id) {
                    ordered.push(id.clone());
                }
            }
        }
        ordered
    }
}

/// Per-agent invocation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub content: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub needs_input: bool,
}

impl AgentResponse {
    pub fn success(agent_id: impl Into<String>, content: impl Into<String>, execution_time_ms: u64) -> Self {
        let content = content.into();
        let needs_input = content.trim_end().ends_with('?');
        Self {
            agent_id: agent_id.into(),
            content,
            success: true,
            error_message: None,
            execution_time_ms,
            needs_input,
        }
    }

    pub fn failure(agent_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            content: String::new(),
            success: false,
            error_message: Some(error_message.into()),
            execution_time_ms: 0,
            needs_input: false,
        }
    }

    pub fn failure_with_timing(
        agent_id: impl Into<String>,
        error_message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let mut r = Self::failure(agent_id, error_message);
        r.execution_time_ms = execution_time_ms;
        r
    }
}

/// `{agent_id, error}` pair recorded for a failed dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAgent {
    pub agent_id: String,
    pub error: String,
}

/// Aggregator output before it's flattened into an [`OrchestratorResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub message: String,
    pub successful_agents: Vec<String>,
    pub failed_agents: Vec<FailedAgent>,
    pub total_execution_time_ms: u64,
    pub needs_input: bool,
}

/// The public return type of a single `Engine::process_request` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResult {
    pub text: String,
    pub needs_input: bool,
    /// True when every dispatched agent failed and none asked for
    /// clarification — the engine transitions the owning task to `Failed`
    /// rather than `Completed` when this is set.
    pub all_failed: bool,
}

impl OrchestratorResult {
    pub fn new(text: impl Into<String>, needs_input: bool) -> Self {
        Self {
            text: text.into(),
            needs_input,
            all_failed: false,
        }
    }

    pub fn with_all_failed(mut self, all_failed: bool) -> Self {
        self.all_failed = all_failed;
        self
    }
}

/// Role of a single turn in session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Short-lived multi-turn history for one `session_id`.
///
/// `history` is never longer than the owning `SessionCache`'s
/// `MaxHistoryItems`; oldest entries are dropped first on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub history: Vec<SessionTurn>,
    pub last_updated: DateTime<Utc>,
}

impl SessionData {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Role of a durable task-log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    pub text: String,
}

/// One append-only entry in an [`AgentTask`]'s history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: String,
    pub role: MessageRole,
    pub task_id: String,
    pub context_id: String,
    pub parts: Vec<MessagePart>,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("")
    }
}

/// Lifecycle state of an [`AgentTask`]. See `TaskManager` for the
/// transition rules enforced around these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Canceled)
    }
}

/// A durable, append-only conversation record keyed by `task_id` within a
/// `context_id` (typically the owning `session_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub context_id: String,
    pub state: TaskState,
    pub history: Vec<AgentMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memoized routing decision, keyed by a fingerprint of the normalized
/// request and the catalog signature at decision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingCacheEntry {
    pub fingerprint: String,
    pub choice: AgentChoice,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl RoutingCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= self.ttl_seconds as i64
    }
}

/// Arbitrary request-scoped metadata threaded through executors and
/// observers instead of ambient thread-local/async-local state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub task_id: String,
    pub session_id: Option<String>,
    pub attributes: HashMap<String, String>,
}
