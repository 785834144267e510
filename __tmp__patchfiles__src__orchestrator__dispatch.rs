//! Fan-out to primary + additional invokers (§4.3).
//!
//! The primary-then-bounded-parallel-additional policy is this crate's
//! resolution of the §9 Open Question, grounded on
//! `orchestration::Orchestration::execute_parallel`'s `tokio::spawn` +
//! join fan-out pattern, applied here only to the "additional agents"
//! sub-fan-out after the primary has already been awaited alone.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use super::invoker::AgentInvoker;
use super::observer::ObserverBus;
use super::router::RAW_REQUEST_PLACEHOLDER;
use super::types::{AgentChoice, AgentResponse};

/// Dispatches a routed [`AgentChoice`] to the agents it names, collecting
/// one [`AgentResponse`] per dispatched agent in dispatch order.
pub struct DispatchExecutor {
    invokers: HashMap<String, Arc<dyn AgentInvoker>>,
    clarification_agent_id: String,
}

impl DispatchExecutor {
    pub fn new(invokers: Vec<Arc<dyn AgentInvoker>>, clarification_agent_id: impl Into<String>) -> Self {
        let mut map = HashMap::with_capacity(invokers.len());
        for invoker in invokers {
            map.insert(invoker.agent_id().to_lowercase(), invoker);
        }
        Self {
            invokers: map,
            clarification_agent_id: clarification_agent_id.into(),
        }
    }

    fn lookup(&self, agent_id: &str) -> Option<Arc<dyn AgentInvoker>> {
        self.invokers.get(&agent_id.to_lowercase()).cloned()
    }

    fn instruction_for(&self, choice: &AgentChoice, agent_id: &str, user_message: &str) -> String {
        match choice.instruction_for(agent_id) {
            Some(text) if text != RAW_REQUEST_PLACEHOLDER => text.to_string(),
            _ => user_message.to_string(),
        }
    }

    /// `dispatch(choice, user_message) -> AgentResponse[]`. Guarantees
    /// `len(result) == len(choice.dispatch_order())`, except the
    /// clarification short-circuit which always returns exactly one
    /// synthetic response regardless of `dispatch_order`.
    pub async fn dispatch(
        &self,
        choice: &AgentChoice,
        user_message: &str,
        session_id: &str,
        observers: &ObserverBus,
    ) -> Vec<AgentResponse> {
        observers.request_started(user_message).await;

        if choice.is_clarification(&self.clarification_agent_id) {
            let response = AgentResponse {
                agent_id: self.clarification_agent_id.clone(),
                content: choice.reasoning.clone(),
                success: true,
                error_message: None,
                execution_time_ms: 0,
                needs_input: true,
            };
            observers.agent_execution_completed(&response).await;
            return vec![response];
        }

        let ordered = choice.dispatch_order();
        let Some((primary_id, additional_ids)) = ordered.split_first() else {
            return Vec::new();
        };

        let primary_response = self.invoke_one(primary_id, choice, user_message, session_id, observers).await;

        if additional_ids.is_empty() {
            return vec![primary_response];
        }

        let additional_futures = additional_ids.iter().map(|agent_id| {
            self.invoke_one(agent_id, choice, user_message, session_id, observers)
        });
        let additional_responses = join_all(additional_futures).await;

        let mut results = Vec::with_capacity(1 + additional_responses.len());
        results.push(primary_response);
        results.extend(additional_responses);
        results
    }

    async fn invoke_one(
        &self,
        agent_id: &str,
        choice: &AgentChoice,
        user_message: &str,
        session_id: &str,
        observers: &ObserverBus,
    ) -> AgentResponse {
        let response = match self.lookup(agent_id) {
            Some(invoker) => {
                let instruction = self.instruction_for(choice, agent_id, user_message);
                invoker.invoke(session_id, &instruction).await
            }
            None => AgentResponse::failure(agent_id, format!("Agent '{}' is not available.", agent_id)),
        };
        observers.agent_execution_completed(&response).await;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::AgentInstruction;
    use async_trait::async_trait;

    struct EchoInvoker(String);

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        fn agent_id(&self) -> &str {
            &self.0
        }

        async fn invoke(&self, _session_id: &str, message: &str) -> AgentResponse {
            AgentResponse::success(self.0.clone(), format!("echo:{}", message), 1)
        }
    }

    fn choice(agent_id: &str, additional: Option<Vec<String>>) -> AgentChoice {
        AgentChoice {
            agent_id: agent_id.to_string(),
            confidence: 0.9,
            reasoning: "because".into(),
            additional_agents: additional,
            agent_instructions: vec![AgentInstruction {
                agent_id: agent_id.to_string(),
                instruction: "do the thing".into(),
            }],
        }
    }

    #[tokio::test]
    async fn missing_invoker_becomes_synthetic_failure() {
        let dispatcher = DispatchExecutor::new(vec![], "clarification");
        let observers = ObserverBus::new(10);
        let responses = dispatcher.dispatch(&choice("ghost-agent", None), "hi", "s1", &observers).await;
        assert_eq!(responses.len(), 1);
        assert!(!responses[0].success);
        assert_eq!(responses[0].error_message.as_deref(), Some("Agent 'ghost-agent' is not available."));
    }

    #[tokio::test]
    async fn dispatch_count_matches_primary_plus_additional() {
        let invokers: Vec<Arc<dyn AgentInvoker>> = vec![
            Arc::new(EchoInvoker("light-agent".into())),
            Arc::new(EchoInvoker("music-agent".into())),
        ];
        let dispatcher = DispatchExecutor::new(invokers, "clarification");
        let observers = ObserverBus::new(10);
        let c = choice("light-agent", Some(vec!["music-agent".into()]));
        let responses = dispatcher.dispatch(&c, "dim and play", "s1", &observers).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].agent_id, "light-agent");
        assert_eq!(responses[1].agent_id, "music-agent");
    }

    #[tokio::test]
    async fn clarification_choice_short_circuits_to_single_response() {
        let dispatcher = DispatchExecutor::new(vec![], "clarification");
        let observers = ObserverBus::new(10);
        let c = AgentChoice {
            agent_id: "clarification".into(),
            confidence: 0.5,
            reasoning: "Which room?".into(),
            additional_agents: None,
            agent_instructions: vec![],
        };
        let responses = dispatcher.dispatch(&c, "play music", "s1", &observers).await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].needs_input);
        assert_eq!(responses[0].content, "Which room?");
    }
}


