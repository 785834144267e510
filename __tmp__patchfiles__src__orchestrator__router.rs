//! LLM-driven request routing with structured-output validation, retries,
//! fallback, and the confidence-threshold clarification policy (§4.2).
//!
//! Grounded on `orchestration::Orchestration`'s mode-dispatch shape for the
//! overall method structure, and on `agent::Agent::parse_tool_call`'s
//! brace-scanning JSON extraction for pulling a structured payload out of a
//! possibly-chatty LLM response.

use std::collections::HashSet;
use std::sync::Arc;

use super::chat_client::{ChatClient, ChatMessage, ChatRequestOptions, ResponseFormat};
use super::config::RouterConfig;
use super::registry::AgentRegistry;
use super::routing_cache::{fingerprint, is_hit_still_valid, RoutingDecisionCache};
use super::types::{AgentCard, AgentChoice, AgentInstruction};

/// Produces a validated [`AgentChoice`] from a user message and the live
/// agent catalog. Never throws — every failure mode in §4.2 resolves to a
/// valid `AgentChoice` (fallback or clarification).
pub struct RouterExecutor {
    chat_client: Arc<dyn ChatClient>,
    registry: Arc<dyn AgentRegistry>,
    routing_cache: Option<Arc<dyn RoutingDecisionCache>>,
    config: RouterConfig,
}

impl RouterExecutor {
    pub fn new(chat_client: Arc<dyn ChatClient>, registry: Arc<dyn AgentRegistry>, config: RouterConfig) -> Self {
        Self {
            chat_client,
            registry,
            routing_cache: None,
            config,
        }
    }

    pub fn with_routing_cache(mut self, cache: Arc<dyn RoutingDecisionCache>) -> Self {
        self.routing_cache = Some(cache);
        self
    }

    /// Route `user_message` to an `AgentChoice`. See §4.2 for the full
    /// eight-step behavior this implements.
    pub async fn route(&self, user_message: &str) -> AgentChoice {
        let catalog = match self.registry.list_agents().await {
            Ok(cards) => cards
                .into_iter()
                .filter(|c| !c.name.eq_ignore_ascii_case("orchestrator"))
                .collect::<Vec<_>>(),
            Err(err) => {
                log::warn!("agent registry call failed: {}", err);
                Vec::new()
            }
        };

        if catalog.is_empty() {
            return self.fallback("No registered agents available for routing.");
        }

        let normalized = user_message.trim().to_lowercase();
        let catalog_names: Vec<String> = catalog.iter().map(|c| c.name.clone()).collect();
        let fp = fingerprint(&normalized, &catalog_names);

        if let Some(cache) = &self.routing_cache {
            if let Some(hit) = cache.get(&fp).await {
                if is_hit_still_valid(&hit, &catalog_names) {
                    return self.apply_confidence_policy(hit, user_message);
                }
                log::warn!("routing cache hit for fingerprint {} referenced a removed agent; treating as miss", fp);
            }
        }

        let system_prompt = self.config.system_prompt.clone();
        let user_prompt = self.render_user_prompt(user_message, &catalog);

        let mut last_cause = String::from("unknown error");
        for attempt in 1..=self.config.max_attempts.max(1) {
            match self.call_llm(&system_prompt, &user_prompt).await {
                Ok(raw) => match self.parse_and_normalize(&raw, &catalog) {
                    Ok(choice) => {
                        if let Some(cache) = &self.routing_cache {
                            if choice.confidence >= self.config.confidence_threshold {
                                cache.put(fp.clone(), choice.clone(), 300).await;
                            }
                        }
                        return self.apply_confidence_policy(choice, user_message);
                    }
                    Err(cause) => {
                        log::warn!("router attempt {}/{} malformed: {}", attempt, self.config.max_attempts, cause);
                        last_cause = cause;
                    }
                },
                Err(cause) => {
                    log::warn!("router attempt {}/{} chat client call failed: {}", attempt, self.config.max_attempts, cause);
                    last_cause = cause;
                }
            }
        }

        self.fallback(&last_cause)
    }

    fn render_user_prompt(&self, user_message: &str, catalog: &[AgentCard]) -> String {
        let mut lines = Vec::with_capacity(catalog.len());
        for card in catalog {
            let mut line = format!("- {}: {}", card.name, card.description);
            if self.config.include_agent_capabilities {
                let mut tags = Vec::new();
                if card.capabilities.streaming {
                    tags.push("streaming");
                }
                if card.capabilities.push {
                    tags.push("push");
                }
                if card.capabilities.state_history {
                    tags.push("state_history");
                }
                if !tags.is_empty() {
                    line.push_str(&format!(" [{}]", tags.join(", ")));
                }
            }
            if self.config.include_skill_examples && !card.skill_examples.is_empty() {
                line.push_str(&format!(" (examples: {})", card.skill_examples.join("; ")));
            }
            lines.push(line);
        }
        let catalog_block = lines.join("\n");

        self.config
            .user_prompt_template
            .replace("{request}", user_message)
            .replace("{catalog}", &catalog_block)
    }

    async fn call_llm(&self, system_prompt: &str, user_prompt: &str) -> Result<String, String> {
        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let options = ChatRequestOptions {
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            response_format: Some(ResponseFormat {
                name: "AgentChoice".to_string(),
                schema: agent_choice_json_schema(),
            }),
        };
        self.chat_client
            .respond(&messages, options)
            .await
            .map(|r| r.content)
            .map_err(|e| e.to_string())
    }

    /// Parse strict JSON, then apply §4.2 step 5's validation/normalization
    /// rules. Returns `Err` with a human-readable cause on anything that
    /// should trigger a retry.
    fn parse_and_normalize(&self, raw: &str, catalog: &[AgentCard]) -> Result<AgentChoice, String> {
        let json_slice = extract_json_object(raw).ok_or_else(|| "no JSON object found in router output".to_string())?;
        let value: serde_json::Value =
            serde_json::from_str(json_slice).map_err(|e| format!("invalid JSON: {}", e))?;

        let agent_id = value
            .get("agent_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing required field agent_id".to_string())?
            .to_string();

        let confidence = value.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
        let reasoning = value
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let catalog_has = |name: &str| catalog.iter().any(|c| c.name.eq_ignore_ascii_case(name));
        if !catalog_has(&agent_id) {
            return Err(format!("unknown agent_id '{}'", agent_id));
        }
        // Canonicalize casing to the catalog's own spelling.
        let canonical_agent_id = catalog
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&agent_id))
            .map(|c| c.name.clone())
            .unwrap_or(agent_id);

        let mut additional = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(canonical_agent_id.to_lowercase());
        if let Some(arr) = value.get("additional_agents").and_then(|v| v.as_array()) {
            for entry in arr {
                if let Some(name) = entry.as_str() {
                    let key = name.to_lowercase();
                    if seen.contains(&key) || !catalog_has(name) {
                        continue;
                    }
                    seen.insert(key);
                    let canonical = catalog
                        .iter()
                        .find(|c| c.name.eq_ignore_ascii_case(name))
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| name.to_string());
                    additional.push(canonical);
                }
            }
        }
        let additional_agents = if additional.is_empty() { None } else { Some(additional) };

        let dispatched: Vec<String> = std::iter::once(canonical_agent_id.clone())
            .chain(additional_agents.clone().unwrap_or_default())
            .collect();

        let mut instructions: Vec<AgentInstruction> = Vec::new();
        let mut instructed: HashSet<String> = HashSet::new();
        if let Some(arr) = value.get("agent_instructions").and_then(|v| v.as_array()) {
            for entry in arr {
                let id = entry.get("agent_id").and_then(|v| v.as_str());
                let instruction = entry.get("instruction").and_then(|v| v.as_str());
                if let (Some(id), Some(instruction)) = (id, instruction) {
                    let key = id.to_lowercase();
                    if instructed.contains(&key) || !dispatched.iter().any(|d| d.eq_ignore_ascii_case(id)) {
                        continue;
                    }
                    instructed.insert(key);
                    instructions.push(AgentInstruction {
                        agent_id: id.to_string(),
                        instruction: instruction.to_string(),
                    });
                }
            }
        }
        // Synthesize a fallback instruction for any dispatched agent missing one.
        for agent_id in &dispatched {
            if !instructed.contains(&agent_id.to_lowercase()) {
                instructions.push(AgentInstruction {
                    agent_id: agent_id.clone(),
                    instruction: raw_request_placeholder(),
                });
                instructed.insert(agent_id.to_lowercase());
            }
        }

        Ok(AgentChoice {
            agent_id: canonical_agent_id,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            additional_agents,
            agent_instructions: instructions,
        })
    }

    /// §4.2 step 6: rewrite low-confidence choices into a clarification.
    fn apply_confidence_policy(&self, choice: AgentChoice, user_request: &str) -> AgentChoice {
        if choice.confidence >= self.config.confidence_threshold {
            return choice;
        }

        let candidates = choice.agent_id.clone();
        let mut reasoning = self
            .config
            .clarification_prompt_template
            .replace("{candidates}", &candidates)
            .replace("{request}", user_request)
            .replace("{original}", &choice.agent_id);
        if !reasoning.trim_end().ends_with('?') {
            reasoning.push('?');
        }

        AgentChoice {
            agent_id: self.config.clarification_agent_id.clone(),
            confidence: choice.confidence,
            reasoning,
            additional_agents: None,
            agent_instructions: Vec::new(),
        }
    }

    fn fallback(&self, cause: &str) -> AgentChoice {
        AgentChoice {
            agent_id: self.config.fallback_agent_id.clone(),
            confidence: 0.0,
            reasoning: self.config.fallback_reason_template.replace("{cause}", cause),
            additional_agents: None,
            agent_instructions: vec![AgentInstruction {
                agent_id: self.config.fallback_agent_id.clone(),
                instruction: raw_request_placeholder(),
            }],
        }
    }
}

/// Marker substituted by `DispatchExecutor` with the original user text when
/// the router didn't (or couldn't) supply a per-agent instruction — keeps
/// `RouterExecutor` from needing to carry the original request string
/// through every synthesized `AgentInstruction`.
pub const RAW_REQUEST_PLACEHOLDER: &str = "\u{0}use-original-request\u{0}";

fn raw_request_placeholder() -> String {
    RAW_REQUEST_PLACEHOLDER.to_string()
}

/// Scans `raw` for the first balanced `{ ... }` object, tolerating prose
/// the LLM may have wrapped the JSON in (code fences, a leading sentence).
/// Mirrors `agent::Agent::parse_tool_call`'s brace-counting approach.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn agent_choice_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "agent_id": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "reasoning": {"type": "string"},
            "additional_agents": {"type": ["array", "null"], "items": {"type": "string"}},
            "agent_instructions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agent_id": {"type": "string"},
                        "instruction": {"type": "string"}
                    },
                    "required": ["agent_id", "instruction"]
                }
            }
        },
        "required": ["agent_id", "confidence", "reasoning"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_prose_and_code_fence() {
        let raw = "Sure, here you go:\n```json\n{\"agent_id\": \"light-agent\", \"confidence\": 0.9, \"reasoning\": \"ok\"}\n```";
        let extracted = extract_json_object(raw).unwrap();
        assert!(extracted.starts_with('{'));
        assert!(extracted.ends_with('}'));
        let _: serde_json::Value = serde_json::from_str(extracted).unwrap();
    }

    #[test]
    fn extracts_json_with_nested_braces() {
        let raw = r#"{"agent_id": "a", "confidence": 1, "reasoning": "x", "agent_instructions": [{"agent_id": "a", "instruction": "y"}]}"#;
        let extracted = extract_json_object(raw).unwrap();
        assert_eq!(extracted, raw);
    }

    #[test]
    fn no_json_object_returns_none() {
        assert!(extract_json_object("no json here").is_none());
    }
}


