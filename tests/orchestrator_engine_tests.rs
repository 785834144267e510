use async_trait::async_trait;
use smart_home_orchestrator::orchestrator::chat_client::{ChatClient, ChatMessage, ChatRequestOptions, ChatResponse};
use smart_home_orchestrator::orchestrator::config::{AgentInvokerConfig, RouterConfig};
use smart_home_orchestrator::orchestrator::engine::Engine;
use smart_home_orchestrator::orchestrator::registry::{
    AgentProvider, AgentRegistry, AgentThread, LocalAgent, LocalAgentResponse, LocalAgentRunOptions, StaticAgentRegistry,
};
use smart_home_orchestrator::orchestrator::session::InMemorySessionCache;
use smart_home_orchestrator::orchestrator::task::{InMemoryTaskManager, TaskManager};
use smart_home_orchestrator::orchestrator::types::{AgentCard, TaskState};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Replays one fixed router JSON payload per call, cycling through a list —
/// enough to script the end-to-end scenarios without a real LLM.
struct ScriptedChatClient {
    responses: Vec<String>,
    call_count: AtomicUsize,
}

impl ScriptedChatClient {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: responses.into_iter().map(|s| s.to_string()).collect(),
            call_count: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn respond(
        &self,
        _messages: &[ChatMessage],
        _options: ChatRequestOptions,
    ) -> Result<ChatResponse, Box<dyn Error + Send + Sync>> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        let content = self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();
        Ok(ChatResponse { content })
    }
}

/// A local agent that always replies with a fixed string.
struct ScriptedAgent {
    id: String,
    reply: String,
    delay: Duration,
}

impl ScriptedAgent {
    fn new(id: &str, reply: &str) -> Self {
        Self {
            id: id.to_string(),
            reply: reply.to_string(),
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LocalAgent for ScriptedAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn run(
        &self,
        _message: &str,
        thread: AgentThread,
        _options: LocalAgentRunOptions,
    ) -> Result<LocalAgentResponse, Box<dyn Error + Send + Sync>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(LocalAgentResponse {
            text: self.reply.clone(),
            thread,
        })
    }
}

/// A local agent that always fails its invocation.
struct FailingAgent {
    id: String,
}

#[async_trait]
impl LocalAgent for FailingAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn run(
        &self,
        _message: &str,
        _thread: AgentThread,
        _options: LocalAgentRunOptions,
    ) -> Result<LocalAgentResponse, Box<dyn Error + Send + Sync>> {
        Err("backend unreachable".into())
    }
}

struct FixedAgentProvider {
    agents: Vec<Arc<dyn LocalAgent>>,
}

#[async_trait]
impl AgentProvider for FixedAgentProvider {
    async fn agents(&self) -> Result<Vec<Arc<dyn LocalAgent>>, Box<dyn Error + Send + Sync>> {
        Ok(self.agents.clone())
    }
}

fn catalog() -> Vec<AgentCard> {
    vec![
        AgentCard::new("light-agent", "Controls smart lights"),
        AgentCard::new("music-agent", "Controls music playback"),
        AgentCard::new("climate-agent", "Reports and controls climate/temperature"),
        AgentCard::new("general-assistant", "Handles anything else"),
    ]
}

fn build_engine(
    chat_client: Arc<dyn ChatClient>,
    agents: Vec<Arc<dyn LocalAgent>>,
    invoker_timeout: Duration,
) -> Engine {
    let registry: Arc<dyn AgentRegistry> = Arc::new(StaticAgentRegistry::new(catalog()));
    let provider: Arc<dyn AgentProvider> = Arc::new(FixedAgentProvider { agents });
    let task_manager = Arc::new(InMemoryTaskManager::new());
    let session_cache = Arc::new(InMemorySessionCache::new(Default::default()));

    Engine::new(chat_client, registry, provider, task_manager, session_cache)
        .with_invoker_config(AgentInvokerConfig::default().with_timeout(invoker_timeout))
        .with_router_config(RouterConfig::default())
}

// Scenario 1: single high-confidence agent, simple success.
#[tokio::test]
async fn single_agent_high_confidence_success() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "light-agent", "confidence": 0.94, "reasoning": "lights", "agent_instructions": [{"agent_id": "light-agent", "instruction": "Turn on the living room lights"}]}"#,
    ]));
    let agents: Vec<Arc<dyn LocalAgent>> = vec![Arc::new(ScriptedAgent::new("light-agent", "Done."))];
    let engine = build_engine(chat, agents, Duration::from_secs(5));

    let result = engine
        .process_request("Turn on the living room lights", None, Some("sess-1".into()))
        .await;

    assert_eq!(result.text, "Done.");
    assert!(!result.needs_input);
}

// Scenario 2: primary + additional agent, both succeed, joined with a space.
#[tokio::test]
async fn primary_and_additional_agent_join_with_space() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "light-agent", "additional_agents": ["music-agent"], "confidence": 0.82, "reasoning": "both", "agent_instructions": [{"agent_id": "light-agent", "instruction": "Dim the living room lights."}, {"agent_id": "music-agent", "instruction": "Play soft music."}]}"#,
    ]));
    let agents: Vec<Arc<dyn LocalAgent>> = vec![
        Arc::new(ScriptedAgent::new("light-agent", "Lights dimmed.")),
        Arc::new(ScriptedAgent::new("music-agent", "Playing Mellow Mix.")),
    ];
    let engine = build_engine(chat, agents, Duration::from_secs(5));

    let result = engine
        .process_request("Dim the living room lights and play soft music", None, Some("sess-2".into()))
        .await;

    assert_eq!(result.text, "Lights dimmed. Playing Mellow Mix.");
    assert!(!result.needs_input);
}

// Scenario 3: low-confidence choice is rewritten into a clarification and
// short-circuits dispatch.
#[tokio::test]
async fn low_confidence_choice_becomes_clarification() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "music-agent", "confidence": 0.55, "reasoning": "ambiguous between two music endpoints", "agent_instructions": []}"#,
    ]));
    // No agents configured — dispatch must never be reached for clarification.
    let engine = build_engine(chat, vec![], Duration::from_secs(5));

    let result = engine.process_request("Play music", None, Some("sess-3".into())).await;

    assert!(result.needs_input);
    assert!(result.text.trim_end().ends_with('?'));
}

// Scenario 4: agent invocation times out; aggregator reports the timeout.
#[tokio::test]
async fn agent_timeout_is_reported_in_aggregate_text() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "climate-agent", "confidence": 0.9, "reasoning": "temp", "agent_instructions": [{"agent_id": "climate-agent", "instruction": "What is the kitchen temperature?"}]}"#,
    ]));
    let agents: Vec<Arc<dyn LocalAgent>> = vec![Arc::new(
        ScriptedAgent::new("climate-agent", "72F").with_delay(Duration::from_millis(50)),
    )];
    // A timeout far shorter than the agent's delay forces a timeout response.
    let engine = build_engine(chat, agents, Duration::from_millis(5));

    let result = engine
        .process_request("What is the kitchen temperature?", None, Some("sess-4".into()))
        .await;

    assert!(result.text.contains("Climate Agent"));
    assert!(result.text.contains("timed out"));
    assert!(!result.needs_input);
}

// Scenario 6: router emits malformed JSON on every attempt; the pipeline
// still completes via the fallback agent.
#[tokio::test]
async fn malformed_router_output_falls_back_to_general_assistant() {
    let chat = Arc::new(ScriptedChatClient::new(vec!["not json at all", "still not json"]));
    let agents: Vec<Arc<dyn LocalAgent>> = vec![Arc::new(ScriptedAgent::new(
        "general-assistant",
        "I can help with that in a general way.",
    ))];
    let engine = build_engine(chat, agents, Duration::from_secs(5));

    let result = engine.process_request("do something obscure", None, Some("sess-6".into())).await;

    assert_eq!(result.text, "I can help with that in a general way.");
    assert!(!result.needs_input);
}

// Boundary: an empty request never creates a task and returns the canned apology.
#[tokio::test]
async fn empty_request_returns_apology_without_creating_task() {
    let chat = Arc::new(ScriptedChatClient::new(vec![]));
    let engine = build_engine(chat, vec![], Duration::from_secs(5));

    let result = engine.process_request("   ", None, Some("sess-empty".into())).await;
    assert!(!result.text.is_empty());
    assert!(!result.needs_input);
}

// Boundary: an empty catalog yields the canned "no agents" message.
#[tokio::test]
async fn empty_catalog_yields_no_agents_message() {
    let chat = Arc::new(ScriptedChatClient::new(vec![]));
    let registry: Arc<dyn AgentRegistry> = Arc::new(StaticAgentRegistry::new(vec![]));
    let provider: Arc<dyn AgentProvider> = Arc::new(FixedAgentProvider { agents: vec![] });
    let task_manager = Arc::new(InMemoryTaskManager::new());
    let session_cache = Arc::new(InMemorySessionCache::new(Default::default()));
    let engine = Engine::new(chat, registry, provider, task_manager, session_cache);

    let result = engine.process_request("anything", None, Some("sess-noagents".into())).await;
    assert!(!result.needs_input);
    assert!(result.text.to_lowercase().contains("agent"));
}

// Two-turn session: turn 1 produces a clarification, turn 2 (with history
// carried by the same session id) dispatches to the resolved agent.
#[tokio::test]
async fn two_turn_session_resolves_clarification_on_second_turn() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "light-agent", "confidence": 0.4, "reasoning": "ambiguous room", "agent_instructions": []}"#,
        r#"{"agent_id": "light-agent", "confidence": 0.95, "reasoning": "living room resolved", "agent_instructions": [{"agent_id": "light-agent", "instruction": "Turn on the living room lights"}]}"#,
    ]));
    let agents: Vec<Arc<dyn LocalAgent>> = vec![Arc::new(ScriptedAgent::new("light-agent", "Done."))];
    let engine = build_engine(chat, agents, Duration::from_secs(5));

    let first = engine.process_request("Turn on the lights", None, Some("sess-multi".into())).await;
    assert!(first.needs_input);

    let second = engine
        .process_request("living room", None, Some("sess-multi".into()))
        .await;
    assert_eq!(second.text, "Done.");
    assert!(!second.needs_input);
}

// When every dispatched agent fails, the owning task transitions to Failed,
// not Completed.
#[tokio::test]
async fn task_transitions_to_failed_when_every_agent_fails() {
    let chat = Arc::new(ScriptedChatClient::new(vec![
        r#"{"agent_id": "light-agent", "confidence": 0.9, "reasoning": "lights", "agent_instructions": [{"agent_id": "light-agent", "instruction": "Turn on the lights"}]}"#,
    ]));
    let registry: Arc<dyn AgentRegistry> = Arc::new(StaticAgentRegistry::new(catalog()));
    let provider: Arc<dyn AgentProvider> = Arc::new(FixedAgentProvider {
        agents: vec![Arc::new(FailingAgent {
            id: "light-agent".into(),
        })],
    });
    let task_manager = Arc::new(InMemoryTaskManager::new());
    let session_cache = Arc::new(InMemorySessionCache::new(Default::default()));
    let engine = Engine::new(chat, registry, provider, Arc::clone(&task_manager) as Arc<dyn TaskManager>, session_cache);

    let task_id = "task-all-fail".to_string();
    let result = engine
        .process_request("Turn on the lights", Some(task_id.clone()), Some("sess-fail".into()))
        .await;

    assert!(!result.needs_input);
    let task = task_manager.get_task(&task_id).await.expect("task should exist");
    assert_eq!(task.state, TaskState::Failed);
}
