//! Agent invocation contracts: one agent, one message, one timeout, no
//! escaping exceptions.
//!
//! Both the local and remote variants enforce the same timeout and map
//! every failure mode — error, timeout, terminal remote task state — onto
//! `AgentResponse::failure*` so callers never have to handle an `Err` from
//! an invoker directly.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::config::AgentInvokerConfig;
use super::registry::{AgentThread, LocalAgent, LocalAgentRunOptions};
use super::task::{SendMessageParams, SendMessageResult, TaskManager};
use super::types::{AgentCard, AgentResponse, MessageRole, TaskState};

/// Opaque per-`(session_id, agent_id)` thread storage for local agents.
///
/// Concurrent use across different keys is safe; dispatcher ordering
/// guarantees a single key is never touched concurrently within one
/// request.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(&self, session_id: &str, agent_id: &str) -> AgentThread;
    async fn save(&self, session_id: &str, agent_id: &str, thread: AgentThread);
}

/// In-memory reference [`SessionStore`]. Threads are lost on process
/// restart — durable persistence is a caller concern per §1.
#[derive(Default)]
pub struct InMemorySessionStore {
    threads: RwLock<HashMap<(String, String), AgentThread>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str, agent_id: &str) -> AgentThread {
        let key = (session_id.to_string(), agent_id.to_string());
        if let Some(thread) = self.threads.read().await.get(&key) {
            return thread.clone();
        }
        AgentThread::default()
    }

    async fn save(&self, session_id: &str, agent_id: &str, thread: AgentThread) {
        let key = (session_id.to_string(), agent_id.to_string());
        self.threads.write().await.insert(key, thread);
    }
}

/// Contract shared by local and remote agent invokers: take a message,
/// enforce a timeout, return a structured [`AgentResponse`]. Implementations
/// must never let an exception escape — every failure mode is mapped to
/// `AgentResponse::failure*`.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    fn agent_id(&self) -> &str;

    async fn invoke(&self, session_id: &str, message: &str) -> AgentResponse;
}

/// Invokes an in-process [`LocalAgent`], round-tripping its thread through a
/// [`SessionStore`].
///
/// Stateless beyond its constructor dependencies — safe to invoke
/// concurrently for different `(session, agent)` pairs, as required by
/// §4.1.
pub struct LocalAgentInvoker {
    agent: Arc<dyn LocalAgent>,
    session_store: Arc<dyn SessionStore>,
    config: AgentInvokerConfig,
}

impl LocalAgentInvoker {
    pub fn new(agent: Arc<dyn LocalAgent>, session_store: Arc<dyn SessionStore>, config: AgentInvokerConfig) -> Self {
        Self {
            agent,
            session_store,
            config,
        }
    }
}

#[async_trait]
impl AgentInvoker for LocalAgentInvoker {
    fn agent_id(&self) -> &str {
        self.agent.agent_id()
    }

    async fn invoke(&self, session_id: &str, message: &str) -> AgentResponse {
        let agent_id = self.agent.agent_id().to_string();
        let thread = self.session_store.get_or_create(session_id, &agent_id).await;
        let started = Instant::now();

        let call = self.agent.run(message, thread, LocalAgentRunOptions::default());
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(response)) => {
                self.session_store.save(session_id, &agent_id, response.thread).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                AgentResponse::success(agent_id, response.text, elapsed_ms)
            }
            Ok(Err(err)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                log::warn!("agent '{}' failed: {}", agent_id, err);
                AgentResponse::failure_with_timing(agent_id, err.to_string(), elapsed_ms)
            }
            Err(_) => {
                let timeout_ms = self.config.timeout.as_millis();
                log::warn!("agent '{}' timed out after {}ms", agent_id, timeout_ms);
                AgentResponse::failure_with_timing(
                    agent_id,
                    format!("Agent execution timed out after {}ms", timeout_ms),
                    self.config.timeout.as_millis() as u64,
                )
            }
        }
    }
}

/// Invokes a remote agent reachable through a [`TaskManager`]-fronted task
/// protocol. The wire transport itself is out of scope per §1 and §9 — this
/// invoker only depends on the `TaskManager` interface.
pub struct RemoteAgentInvoker {
    card: AgentCard,
    task_manager: Arc<dyn TaskManager>,
    config: AgentInvokerConfig,
}

impl RemoteAgentInvoker {
    pub fn new(card: AgentCard, task_manager: Arc<dyn TaskManager>, config: AgentInvokerConfig) -> Self {
        Self {
            card,
            task_manager,
            config,
        }
    }
}

#[async_trait]
impl AgentInvoker for RemoteAgentInvoker {
    fn agent_id(&self) -> &str {
        &self.card.name
    }

    async fn invoke(&self, session_id: &str, message: &str) -> AgentResponse {
        let agent_id = self.card.name.clone();
        let started = Instant::now();

        let params = SendMessageParams {
            agent_id: agent_id.clone(),
            context_id: session_id.to_string(),
            task_id: None,
            text: message.to_string(),
        };
        let call = self.task_manager.send_message(params);
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(outcome)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    SendMessageResult::Task(task) => match task.state {
                        TaskState::Completed | TaskState::Working | TaskState::InputRequired => {
                            let text = task
                                .history
                                .iter()
                                .rev()
                                .find(|m| m.role == MessageRole::Agent)
                                .map(|m| m.text())
                                .unwrap_or_default();
                            AgentResponse::success(agent_id, text, elapsed_ms)
                        }
                        TaskState::Failed | TaskState::Canceled => AgentResponse::failure_with_timing(
                            agent_id,
                            format!("remote agent task ended in state {:?}", task.state),
                            elapsed_ms,
                        ),
                    },
                    SendMessageResult::Message(msg) => AgentResponse::success(agent_id, msg.text(), elapsed_ms),
                }
            }
            Ok(Err(err)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                AgentResponse::failure_with_timing(agent_id, err.to_string(), elapsed_ms)
            }
            Err(_) => {
                let timeout_ms = self.config.timeout.as_millis();
                AgentResponse::failure_with_timing(
                    agent_id,
                    format!("Agent execution timed out after {}ms", timeout_ms),
                    self.config.timeout.as_millis() as u64,
                )
            }
        }
    }
}
