//! Agent catalog and local-agent external collaborators.
//!
//! `AgentRegistry`/`AgentProvider`/`LocalAgent` are the three seams through
//! which the orchestration core learns what agents exist and, for local
//! ones, how to actually run them. Concrete agent implementations
//! (device-control skills, web search, media control, etc.) live outside
//! this crate — only the contracts live here.

use async_trait::async_trait;
use std::error::Error;

use super::types::AgentCard;

/// Opaque per-agent conversational state, round-tripped through
/// [`LocalAgent::new_thread`]/[`LocalAgent::deserialize_thread`] and
/// persisted by a `SessionStore`.
#[derive(Debug, Clone, Default)]
pub struct AgentThread {
    pub bytes: Vec<u8>,
}

/// Response from a single [`LocalAgent::run`] call.
#[derive(Debug, Clone)]
pub struct LocalAgentResponse {
    pub text: String,
    pub thread: AgentThread,
}

/// Options threaded into a [`LocalAgent::run`] call. Deliberately minimal —
/// richer per-call tuning belongs to the concrete agent implementation, not
/// this contract.
#[derive(Debug, Clone, Default)]
pub struct LocalAgentRunOptions {
    pub instruction_override: Option<String>,
}

/// An in-process agent capability. Concrete implementations wrap whatever
/// LLM-backed skill they provide; this trait is the only thing the
/// orchestration core depends on.
#[async_trait]
pub trait LocalAgent: Send + Sync {
    fn agent_id(&self) -> &str;

    async fn run(
        &self,
        message: &str,
        thread: AgentThread,
        options: LocalAgentRunOptions,
    ) -> Result<LocalAgentResponse, Box<dyn Error + Send + Sync>>;

    fn new_thread(&self) -> AgentThread {
        AgentThread::default()
    }

    fn deserialize_thread(&self, bytes: Vec<u8>) -> AgentThread {
        AgentThread { bytes }
    }
}

/// Enumerates the live agent catalog. Enumeration must be consistent for
/// the duration of one `RouterExecutor::route` call — implementations
/// should return a coherent snapshot, not a live cursor that can change
/// mid-call.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentCard>, Box<dyn Error + Send + Sync>>;
}

/// Optional alternative source of live [`LocalAgent`] instances, useful for
/// tests and dynamically constructed agents that don't go through a static
/// registry.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    async fn agents(&self) -> Result<Vec<std::sync::Arc<dyn LocalAgent>>, Box<dyn Error + Send + Sync>>;
}

/// A trivial [`AgentRegistry`] backed by a fixed, in-memory list of cards —
/// the reference implementation used by tests and simple deployments.
pub struct StaticAgentRegistry {
    cards: Vec<AgentCard>,
}

impl StaticAgentRegistry {
    pub fn new(cards: Vec<AgentCard>) -> Self {
        Self { cards }
    }
}

#[async_trait]
impl AgentRegistry for StaticAgentRegistry {
    async fn list_agents(&self) -> Result<Vec<AgentCard>, Box<dyn Error + Send + Sync>> {
        Ok(self.cards.clone())
    }
}
