//! Orders, merges, and formats dispatched responses into the final
//! user-facing reply, detecting clarification and failure.
//!
//! Small struct, plain functions, a `log::info!` once the merge is done —
//! nothing here needs to be more elaborate than that.

use super::config::AggregatorConfig;
use super::observer::ObserverBus;
use super::types::{AggregationResult, AgentResponse, FailedAgent, OrchestratorResult};

pub struct AggregatorExecutor {
    config: AggregatorConfig,
}

impl AggregatorExecutor {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// `aggregate(responses[]) -> OrchestratorResult`. See §4.4 for the
    /// eight numbered steps this implements in order.
    pub async fn aggregate(&self, mut responses: Vec<AgentResponse>, observers: &ObserverBus) -> OrchestratorResult {
        sort_by_priority(&mut responses, &self.config.agent_priority);

        let total_execution_time_ms = responses.iter().map(|r| r.execution_time_ms).sum();
        let successes: Vec<&AgentResponse> = responses.iter().filter(|r| r.success).collect();
        let failures: Vec<FailedAgent> = responses
            .iter()
            .filter(|r| !r.success)
            .map(|r| FailedAgent {
                agent_id: r.agent_id.clone(),
                error: r
                    .error_message
                    .clone()
                    .unwrap_or_else(|| self.config.default_failure_message.clone()),
            })
            .collect();

        let needs_input = successes.iter().any(|r| r.needs_input);
        let all_failed = !responses.is_empty() && successes.is_empty() && !needs_input;

        let message = if needs_input {
            successes
                .iter()
                .find(|r| r.needs_input)
                .map(|r| r.content.clone())
                .unwrap_or_default()
        } else if successes.is_empty() && failures.is_empty() {
            self.config.default_fallback_message.clone()
        } else {
            self.compose_message(&successes, &failures)
        };

        let result = AggregationResult {
            message: message.clone(),
            successful_agents: successes.iter().map(|r| r.agent_id.clone()).collect(),
            failed_agents: failures,
            total_execution_time_ms,
            needs_input,
        };

        log::info!(
            "aggregated {} successes, {} failures into {} chars (needs_input={})",
            result.successful_agents.len(),
            result.failed_agents.len(),
            result.message.len(),
            result.needs_input
        );

        observers.response_aggregated(&result.message).await;

        OrchestratorResult::new(result.message, result.needs_input).with_all_failed(all_failed)
    }

    fn compose_message(&self, successes: &[&AgentResponse], failures: &[FailedAgent]) -> String {
        if !self.config.enable_natural_language_joining {
            return self.compose_message_plain(successes, failures);
        }

        let mut parts: Vec<String> = Vec::new();

        for response in successes {
            let trimmed = response.content.trim();
            if trimmed.is_empty() {
                parts.push(
                    self.config
                        .default_success_template
                        .replace("{0}", &format_agent_name(&response.agent_id)),
                );
            } else {
                parts.push(trimmed.to_string());
            }
        }

        let mut message = parts.join(" ");

        if failures.len() == 1 {
            let f = &failures[0];
            message.push_str(&format!(
                "{}However, I couldn't complete {}: {}.",
                if message.is_empty() { "" } else { " " },
                format_agent_name(&f.agent_id),
                f.error
            ));
        } else if failures.len() > 1 {
            let joined = failures
                .iter()
                .map(|f| format!("{} ({})", format_agent_name(&f.agent_id), f.error))
                .collect::<Vec<_>>()
                .join(", ");
            message.push_str(&format!(
                "{}However, I ran into issues with {}.",
                if message.is_empty() { "" } else { " " },
                joined
            ));
        }

        message
    }

    /// Flat rendering used when `enable_natural_language_joining` is off:
    /// one line per success, one `agent: error` line per failure, no
    /// connective prose.
    fn compose_message_plain(&self, successes: &[&AgentResponse], failures: &[FailedAgent]) -> String {
        let mut lines: Vec<String> = Vec::new();
        for response in successes {
            let trimmed = response.content.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        for f in failures {
            lines.push(format!("{}: {}", format_agent_name(&f.agent_id), f.error));
        }
        lines.join("\n")
    }
}

/// Stable sort by the configured priority list (index; unknowns last), then
/// by `agent_id` case-insensitively.
fn sort_by_priority(responses: &mut [AgentResponse], priority: &[String]) {
    let rank = |agent_id: &str| -> usize {
        priority
            .iter()
            .position(|p| p.eq_ignore_ascii_case(agent_id))
            .unwrap_or(priority.len())
    };
    responses.sort_by(|a, b| {
        rank(&a.agent_id)
            .cmp(&rank(&b.agent_id))
            .then_with(|| a.agent_id.to_lowercase().cmp(&b.agent_id.to_lowercase()))
    });
}

/// Split on `-`/`_`, title-case each token, join with spaces.
pub fn format_agent_name(agent_id: &str) -> String {
    agent_id
        .split(|c| c == '-' || c == '_')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_agent_name_from_hyphen_and_underscore() {
        assert_eq!(format_agent_name("light-agent"), "Light Agent");
        assert_eq!(format_agent_name("climate_agent"), "Climate Agent");
        assert_eq!(format_agent_name("general-assistant"), "General Assistant");
    }

    #[tokio::test]
    async fn single_success_passes_content_through() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let result = agg
            .aggregate(vec![AgentResponse::success("light-agent", "Done.", 5)], &observers)
            .await;
        assert_eq!(result.text, "Done.");
        assert!(!result.needs_input);
    }

    #[tokio::test]
    async fn two_successes_join_with_single_space() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let result = agg
            .aggregate(
                vec![
                    AgentResponse::success("light-agent", "Lights dimmed.", 5),
                    AgentResponse::success("music-agent", "Playing Mellow Mix.", 5),
                ],
                &observers,
            )
            .await;
        assert_eq!(result.text, "Lights dimmed. Playing Mellow Mix.");
    }

    #[tokio::test]
    async fn single_failure_composes_apology_sentence() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let result = agg
            .aggregate(
                vec![AgentResponse::failure(
                    "climate-agent",
                    "Agent execution timed out after 30000ms",
                )],
                &observers,
            )
            .await;
        assert_eq!(
            result.text,
            "However, I couldn't complete Climate Agent: Agent execution timed out after 30000ms."
        );
        assert!(!result.needs_input);
    }

    #[tokio::test]
    async fn needs_input_short_circuits_to_first_clarifying_content() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let mut clarifying = AgentResponse::success("clarification", "Which room?", 0);
        clarifying.needs_input = true;
        let result = agg.aggregate(vec![clarifying], &observers).await;
        assert!(result.needs_input);
        assert_eq!(result.text, "Which room?");
    }

    #[tokio::test]
    async fn empty_response_list_uses_fallback_message() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let result = agg.aggregate(vec![], &observers).await;
        assert_eq!(result.text, "I'm still working on that request.");
        assert!(!result.all_failed);
    }

    #[tokio::test]
    async fn all_agents_failing_sets_all_failed_flag() {
        let agg = AggregatorExecutor::new(AggregatorConfig::default());
        let observers = ObserverBus::new(10);
        let result = agg
            .aggregate(
                vec![
                    AgentResponse::failure("light-agent", "connection refused"),
                    AgentResponse::failure("music-agent", "connection refused"),
                ],
                &observers,
            )
            .await;
        assert!(result.all_failed);
        assert!(!result.needs_input);
    }

    #[tokio::test]
    async fn priority_list_orders_before_alphabetical_fallback() {
        let config = AggregatorConfig::default().with_agent_priority(vec!["music-agent".into()]);
        let agg = AggregatorExecutor::new(config);
        let observers = ObserverBus::new(10);
        let result = agg
            .aggregate(
                vec![
                    AgentResponse::success("light-agent", "Lights dimmed.", 5),
                    AgentResponse::success("music-agent", "Playing Mellow Mix.", 5),
                ],
                &observers,
            )
            .await;
        assert_eq!(result.text, "Playing Mellow Mix. Lights dimmed.");
    }
}
