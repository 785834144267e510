//! Configuration structs for the orchestration core.
//!
//! Plain structs constructed manually: no TOML/YAML/other config-file
//! parsing dependency is introduced here. Each struct implements
//! [`Default`] with the documented defaults and a handful of `with_*`
//! builders for the fields call sites and tests override most.

use std::time::Duration;

/// Options consulted by [`crate::orchestrator::router::RouterExecutor`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub confidence_threshold: f32,
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub agent_catalog_header: String,
    pub clarification_prompt_template: String,
    pub fallback_reason_template: String,
    pub clarification_agent_id: String,
    pub fallback_agent_id: String,
    pub include_agent_capabilities: bool,
    pub include_skill_examples: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_attempts: 2,
            temperature: 1.0,
            max_output_tokens: 512,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt_template: "User request: {request}\n\n{catalog_header}\n{catalog}".to_string(),
            agent_catalog_header: "Available agents:".to_string(),
            clarification_prompt_template:
                "I'm not fully sure which of {candidates} best handles \"{request}\" (closest guess: {original}). Could you clarify?"
                    .to_string(),
            fallback_reason_template: "Falling back to the general assistant because: {cause}".to_string(),
            clarification_agent_id: "clarification".to_string(),
            fallback_agent_id: "general-assistant".to_string(),
            include_agent_capabilities: true,
            include_skill_examples: false,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a routing controller for a smart-home assistant. \
Given a user request and a catalog of available agents, choose exactly one primary agent \
(and, optionally, additional agents to run alongside it) that can satisfy the request. \
Respond with JSON matching the AgentChoice schema: \
{\"agent_id\": string, \"confidence\": number between 0 and 1, \"reasoning\": string, \
\"additional_agents\": [string] | null, \"agent_instructions\": [{\"agent_id\": string, \"instruction\": string}]}. \
Only choose agent_ids that appear in the catalog.";

impl RouterConfig {
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_fallback_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.fallback_agent_id = agent_id.into();
        self
    }

    pub fn with_clarification_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.clarification_agent_id = agent_id.into();
        self
    }
}

/// Options consulted by [`crate::orchestrator::invoker::AgentInvoker`]
/// implementations.
#[derive(Debug, Clone)]
pub struct AgentInvokerConfig {
    pub timeout: Duration,
}

impl Default for AgentInvokerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl AgentInvokerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options consulted by
/// [`crate::orchestrator::aggregator::AggregatorExecutor`].
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Agents named here sort earlier than unnamed ones; unnamed agents
    /// sort after all named ones, then by `agent_id`.
    pub agent_priority: Vec<String>,
    pub default_success_template: String,
    pub default_fallback_message: String,
    pub default_failure_message: String,
    pub enable_natural_language_joining: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            agent_priority: Vec::new(),
            default_success_template: "{0} completed successfully.".to_string(),
            default_fallback_message: "I'm still working on that request.".to_string(),
            default_failure_message: "Unknown error".to_string(),
            enable_natural_language_joining: true,
        }
    }
}

impl AggregatorConfig {
    pub fn with_agent_priority(mut self, priority: Vec<String>) -> Self {
        self.agent_priority = priority;
        self
    }
}

/// Options consulted by [`crate::orchestrator::session::SessionCache`].
#[derive(Debug, Clone, Copy)]
pub struct SessionCacheConfig {
    pub session_cache_length_minutes: i64,
    pub max_history_items: usize,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            session_cache_length_minutes: 5,
            max_history_items: 20,
        }
    }
}

impl SessionCacheConfig {
    pub fn with_max_history_items(mut self, max: usize) -> Self {
        self.max_history_items = max;
        self
    }

    pub fn with_session_cache_length_minutes(mut self, minutes: i64) -> Self {
        self.session_cache_length_minutes = minutes;
        self
    }
}
