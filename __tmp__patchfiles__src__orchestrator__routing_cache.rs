//! Memoizes `RouterExecutor` decisions only — never agent side effects
//! (§4.6).
//!
//! Fingerprints reuse `sha2`, already a teacher dependency (used there for
//! content-addressing in `thought_chain.rs`); here it hashes the normalized
//! request plus the sorted catalog signature instead.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{AgentChoice, RoutingCacheEntry};

/// Computes the fingerprint `RouterExecutor` uses to key both lookups and
/// inserts: a hash of the normalized (lowercased, trimmed) request text and
/// the sorted, comma-joined catalog names.
///
/// Catalog signature is names-only, matching the distilled spec's text
/// literally (§9 Open Questions: description-only edits do not invalidate a
/// cached decision — a known, documented limitation).
pub fn fingerprint(normalized_request: &str, catalog_names: &[String]) -> String {
    let mut sorted: Vec<String> = catalog_names.iter().map(|n| n.to_lowercase()).collect();
    sorted.sort();
    let signature = sorted.join(",");

    let mut hasher = Sha256::new();
    hasher.update(normalized_request.as_bytes());
    hasher.update(b"\0");
    hasher.update(signature.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Caches only `AgentChoice` routing decisions, keyed by fingerprint.
/// Callers MUST revalidate a hit's `agent_id`/`additional_agents` against
/// the live catalog before use — a removed agent makes a hit equivalent to
/// a miss.
#[async_trait]
pub trait RoutingDecisionCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Option<AgentChoice>;
    async fn put(&self, fingerprint: String, choice: AgentChoice, ttl_seconds: u64);
}

/// In-memory exact-match reference implementation. A semantic variant would
/// implement the same trait over an embedding index, picking the
/// highest-similarity candidate above a configured threshold — left to
/// callers since embedding providers are out of scope per §1.
#[derive(Default)]
pub struct ExactRoutingDecisionCache {
    entries: RwLock<HashMap<String, RoutingCacheEntry>>,
}

impl ExactRoutingDecisionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoutingDecisionCache for ExactRoutingDecisionCache {
    async fn get(&self, fingerprint: &str) -> Option<AgentChoice> {
        let mut entries = self.entries.write().await;
        let entry = entries.get(fingerprint)?;
        if entry.is_expired(Utc::now()) {
            entries.remove(fingerprint);
            return None;
        }
        Some(entry.choice.clone())
    }

    async fn put(&self, fingerprint: String, choice: AgentChoice, ttl_seconds: u64) {
        let entry = RoutingCacheEntry {
            fingerprint: fingerprint.clone(),
            choice,
            created_at: Utc::now(),
            ttl_seconds,
        };
        self.entries.write().await.insert(fingerprint, entry);
    }
}

/// Validates a cached choice against the live catalog per §4.2 step 3: a
/// hit is only usable when `agent_id` and every `additional_agents` entry
/// still exist.
pub fn is_hit_still_valid(choice: &AgentChoice, catalog_names: &[String]) -> bool {
    let exists = |name: &str| catalog_names.iter().any(|c| c.eq_ignore_ascii_case(name));
    if !exists(&choice.agent_id) {
        return false;
    }
    if let Some(extra) = &choice.additional_agents {
        if !extra.iter().all(|a| exists(a)) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::AgentInstruction;

    fn sample_choice() -> AgentChoice {
        AgentChoice {
            agent_id: "light-agent".into(),
            confidence: 0.9,
            reasoning: "lights".into(),
            additional_agents: None,
            agent_instructions: vec![AgentInstruction {
                agent_id: "light-agent".into(),
                instruction: "turn on the lights".into(),
            }],
        }
    }

    #[test]
    fn fingerprint_is_order_independent_over_catalog_names() {
        let a = fingerprint("turn on lights", &["b-agent".into(), "a-agent".into()]);
        let b = fingerprint("turn on lights", &["a-agent".into(), "b-agent".into()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_request_text() {
        let a = fingerprint("turn on lights", &["a-agent".into()]);
        let b = fingerprint("turn off lights", &["a-agent".into()]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn hit_then_miss_after_ttl_expires() {
        let cache = ExactRoutingDecisionCache::new();
        cache.put("fp1".into(), sample_choice(), 0).await;
        // ttl_seconds = 0 means anything already elapsed counts as expired.
        assert!(cache.get("fp1").await.is_none());
    }

    #[test]
    fn hit_referencing_removed_agent_is_invalid() {
        let choice = sample_choice();
        assert!(is_hit_still_valid(&choice, &["light-agent".into()]));
        assert!(!is_hit_still_valid(&choice, &["music-agent".into()]));
    }
}


