//! Top-level request lifecycle: load session/task, build a history-aware
//! request, run the workflow, persist the result.
//!
//! `Engine::process_request` is the single call site that orchestrates
//! everything else in this module — session/task loading, the router ->
//! dispatch -> aggregate pipeline, and persistence all happen behind one
//! entry point so callers never have to wire the pieces together
//! themselves.

use std::sync::Arc;

use super::aggregator::AggregatorExecutor;
use super::chat_client::ChatClient;
use super::config::{AgentInvokerConfig, AggregatorConfig, RouterConfig, SessionCacheConfig};
use super::dispatch::DispatchExecutor;
use super::error::OrchestratorError;
use super::invoker::{AgentInvoker, InMemorySessionStore, LocalAgentInvoker, RemoteAgentInvoker, SessionStore};
use super::observer::ObserverBus;
use super::registry::{AgentProvider, AgentRegistry};
use super::router::RouterExecutor;
use super::routing_cache::RoutingDecisionCache;
use super::session::SessionCache;
use super::task::TaskManager;
use super::types::{AgentMessage, MessagePart, MessageRole, OrchestratorResult, RequestContext, SessionTurn, TaskState, TurnRole};
use super::workflow::WorkflowRuntime;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

const APOLOGY_TEXT: &str = "Sorry, something went wrong handling your request. Please try again.";
const NO_AGENTS_TEXT: &str = "I don't have any agents available to handle that request right now.";

/// Top-level dependencies the engine wires together once per process and
/// reuses across requests; everything here is `Arc`-shared so a single
/// `Engine` is safe to call concurrently for independent requests.
pub struct Engine {
    chat_client: Arc<dyn ChatClient>,
    registry: Arc<dyn AgentRegistry>,
    agent_provider: Arc<dyn AgentProvider>,
    session_store: Arc<dyn SessionStore>,
    session_cache: Arc<dyn SessionCache>,
    task_manager: Arc<dyn TaskManager>,
    routing_cache: Option<Arc<dyn RoutingDecisionCache>>,
    router_config: RouterConfig,
    invoker_config: AgentInvokerConfig,
    aggregator_config: AggregatorConfig,
    session_cache_config: SessionCacheConfig,
}

impl Engine {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        registry: Arc<dyn AgentRegistry>,
        agent_provider: Arc<dyn AgentProvider>,
        task_manager: Arc<dyn TaskManager>,
        session_cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            chat_client,
            registry,
            agent_provider,
            session_store: Arc::new(InMemorySessionStore::new()),
            session_cache,
            task_manager,
            routing_cache: None,
            router_config: RouterConfig::default(),
            invoker_config: AgentInvokerConfig::default(),
            aggregator_config: AggregatorConfig::default(),
            session_cache_config: SessionCacheConfig::default(),
        }
    }

    pub fn with_routing_cache(mut self, cache: Arc<dyn RoutingDecisionCache>) -> Self {
        self.routing_cache = Some(cache);
        self
    }

    pub fn with_router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    pub fn with_invoker_config(mut self, config: AgentInvokerConfig) -> Self {
        self.invoker_config = config;
        self
    }

    pub fn with_aggregator_config(mut self, config: AggregatorConfig) -> Self {
        self.aggregator_config = config;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = store;
        self
    }

    /// `process_request(user_request, task_id?, session_id?) ->
    /// OrchestratorResult`. Implements the twelve steps of §4.9. Never
    /// propagates an error to the caller: any failure is caught at the
    /// boundary, the task is best-effort transitioned to `Failed`, and a
    /// canned apology is returned.
    pub async fn process_request(
        &self,
        user_request: &str,
        task_id: Option<String>,
        session_id: Option<String>,
    ) -> OrchestratorResult {
        // Step 1: validate non-empty request.
        let trimmed = user_request.trim();
        if trimmed.is_empty() {
            log::warn!("engine received empty user_request; no task created");
            return OrchestratorResult::new(APOLOGY_TEXT, false);
        }

        match self.process_request_inner(trimmed, task_id, session_id).await {
            Ok(result) => result,
            Err(err) => {
                log::error!("engine request failed: {}", err);
                OrchestratorResult::new(APOLOGY_TEXT, false)
            }
        }
    }

    async fn process_request_inner(
        &self,
        user_request: &str,
        task_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<OrchestratorResult, OrchestratorError> {
        // Step 2: load session data (if any) and the task (create if missing).
        let session_data = match &session_id {
            Some(sid) => self.session_cache.get(sid).await,
            None => None,
        };

        let task = match &task_id {
            Some(tid) => match self.task_manager.get_task(tid).await {
                Some(t) => t,
                None => self.task_manager.create_task(session_id.clone(), Some(tid.clone())).await,
            },
            None => self.task_manager.create_task(session_id.clone(), None).await,
        };

        // Step 3: append user AgentMessage; transition to Working.
        let user_message_record = AgentMessage {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            parts: vec![MessagePart { text: user_request.to_string() }],
            created_at: Utc::now(),
        };
        self.task_manager
            .update_status(&task.id, TaskState::Working, Some(user_message_record))
            .await?;

        // Step 4: enumerate the agent catalog.
        let catalog = self
            .registry
            .list_agents()
            .await
            .map_err(|e| OrchestratorError::CatalogUnavailable(format!("agent registry failed: {}", e)))?;
        if catalog.is_empty() {
            self.fail_task(&task.id, NO_AGENTS_TEXT).await;
            return Ok(OrchestratorResult::new(NO_AGENTS_TEXT, false));
        }

        // Step 5: resolve live local agents + matching cards into invokers.
        let local_agents = self
            .agent_provider
            .agents()
            .await
            .map_err(|e| OrchestratorError::CatalogUnavailable(format!("agent provider failed: {}", e)))?;
        let mut invokers: Vec<Arc<dyn AgentInvoker>> = Vec::new();
        for agent in local_agents {
            invokers.push(Arc::new(LocalAgentInvoker::new(
                agent,
                Arc::clone(&self.session_store),
                self.invoker_config.clone(),
            )));
        }
        for card in catalog.iter().filter(|c| c.is_remote()) {
            invokers.push(Arc::new(RemoteAgentInvoker::new(
                card.clone(),
                Arc::clone(&self.task_manager),
                self.invoker_config.clone(),
            )));
        }
        // No early bail-out on an empty `invokers` here: routing still needs
        // to run, since a low-confidence choice resolves to a clarification
        // that never touches an invoker at all. If routing does pick a real
        // agent with nothing to dispatch to, `DispatchExecutor` turns the
        // missing lookup into a synthetic per-agent failure, and the
        // all-failed case is caught after aggregation below.

        // Step 6: compose the history-aware request.
        let history = session_data.as_ref().map(|s| s.history.as_slice()).unwrap_or(&[]);
        let history_aware_request = compose_history_aware_request(Some(history), user_request);

        // Step 7: fire OnRequestStarted before routing begins.
        let observers = ObserverBus::default();
        observers.request_started(user_request, history).await;

        // Step 8: build the workflow and run it.
        let router = RouterExecutor::new(Arc::clone(&self.chat_client), Arc::clone(&self.registry), self.router_config.clone());
        let router = match &self.routing_cache {
            Some(cache) => router.with_routing_cache(Arc::clone(cache)),
            None => router,
        };
        let dispatcher = DispatchExecutor::new(invokers, self.router_config.clarification_agent_id.clone());
        let aggregator = AggregatorExecutor::new(self.aggregator_config.clone());
        let runtime = WorkflowRuntime::new("smart-home-orchestration", router, dispatcher, aggregator);

        let effective_session_id = session_id.clone().unwrap_or_else(|| task.context_id.clone());
        let context = RequestContext {
            task_id: task.id.clone(),
            session_id: Some(effective_session_id),
            attributes: HashMap::new(),
        };
        let (result, span) = runtime.run(&history_aware_request, &context, &observers).await;
        log::info!(
            "workflow '{}' finished in {}ms, output length {}",
            span.workflow_name,
            span.execution_time_ms,
            span.output_length
        );

        // Step 10: append assistant message; transition to Completed or InputRequired.
        let assistant_message = AgentMessage {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            parts: vec![MessagePart { text: result.text.clone() }],
            created_at: Utc::now(),
        };
        let final_state = if result.needs_input {
            TaskState::InputRequired
        } else if result.all_failed {
            TaskState::Failed
        } else {
            TaskState::Completed
        };
        self.task_manager
            .update_status(&task.id, final_state, Some(assistant_message))
            .await?;

        // Step 11: save session (append user+assistant turns, trim on save).
        if let Some(sid) = &session_id {
            self.session_cache
                .save(sid, vec![SessionTurn::user(user_request), SessionTurn::assistant(&result.text)])
                .await;
        }

        Ok(result)
    }

    async fn fail_task(&self, task_id: &str, reason: &str) {
        let message = AgentMessage {
            message_id: Uuid::new_v4().to_string(),
            role: MessageRole::Agent,
            task_id: task_id.to_string(),
            context_id: task_id.to_string(),
            parts: vec![MessagePart { text: reason.to_string() }],
            created_at: Utc::now(),
        };
        if let Err(err) = self.task_manager.update_status(task_id, TaskState::Failed, Some(message)).await {
            log::error!("failed to finalize task {} as Failed: {}", task_id, err);
        }
    }
}

fn compose_history_aware_request(history: Option<&[SessionTurn]>, user_request: &str) -> String {
    let Some(history) = history.filter(|h| !h.is_empty()) else {
        return user_request.to_string();
    };

    let mut rendered = String::new();
    for turn in history {
        let role = match turn.role {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        };
        rendered.push_str(&format!("{}: {}\n", role, turn.content));
    }
    rendered.push_str(&format!("User: {}", user_request));
    rendered
}
