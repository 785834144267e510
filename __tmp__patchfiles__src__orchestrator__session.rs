//! Short-lived multi-turn conversation history, keyed by `session_id` (§3,
//! §4.7).
//!
//! The trimming loop is grounded on
//! `llm_session::LLMSession::trim_conversation_history`, adapted from
//! token-count trimming to the item-count trimming `MaxHistoryItems`
//! requires.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::config::SessionCacheConfig;
use super::types::{SessionData, SessionTurn};

/// Drop oldest turns until `history.len() <= max_items`.
fn trim_to(history: &mut Vec<SessionTurn>, max_items: usize) {
    while history.len() > max_items {
        history.remove(0);
    }
}

/// Short-TTL multi-turn history store. `get` returns `None` once the
/// session has aged past `SessionCacheLengthMinutes` of inactivity; `save`
/// creates the session if it doesn't exist yet and always trims to
/// `MaxHistoryItems` newest items.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<SessionData>;
    async fn save(&self, session_id: &str, turns: Vec<SessionTurn>);
}

/// In-memory reference `SessionCache`.
pub struct InMemorySessionCache {
    config: SessionCacheConfig,
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl InMemorySessionCache {
    pub fn new(config: SessionCacheConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(&self, session_id: &str) -> Option<SessionData> {
        let mut sessions = self.sessions.write().await;
        let data = sessions.get(session_id)?;

        let age = Utc::now().signed_duration_since(data.last_updated);
        if age.num_minutes() >= self.config.session_cache_length_minutes {
            sessions.remove(session_id);
            return None;
        }
        Some(data.clone())
    }

    async fn save(&self, session_id: &str, turns: Vec<SessionTurn>) {
        let mut sessions = self.sessions.write().await;
        let data = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionData::new(session_id));

        data.history.extend(turns);
        trim_to(&mut data.history, self.config.max_history_items);
        data.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::TurnRole;

    #[tokio::test]
    async fn save_then_get_round_trips_order_and_content() {
        let cache = InMemorySessionCache::new(SessionCacheConfig::default());
        cache
            .save("s1", vec![SessionTurn::user("hi"), SessionTurn::assistant("hello")])
            .await;

        let data = cache.get("s1").await.unwrap();
        assert_eq!(data.history.len(), 2);
        assert_eq!(data.history[0].role, TurnRole::User);
        assert_eq!(data.history[0].content, "hi");
        assert_eq!(data.history[1].role, TurnRole::Assistant);
        assert_eq!(data.history[1].content, "hello");
    }

    #[tokio::test]
    async fn history_is_trimmed_to_max_items_dropping_oldest_first() {
        let cache = InMemorySessionCache::new(SessionCacheConfig::default().with_max_history_items(3));
        for i in 0..5 {
            cache.save("s1", vec![SessionTurn::user(format!("turn-{i}"))]).await;
        }
        let data = cache.get("s1").await.unwrap();
        assert_eq!(data.history.len(), 3);
        assert_eq!(data.history[0].content, "turn-2");
        assert_eq!(data.history[2].content, "turn-4");
    }

    #[tokio::test]
    async fn missing_session_is_none_on_get() {
        let cache = InMemorySessionCache::new(SessionCacheConfig::default());
        assert!(cache.get("nope").await.is_none());
    }
}


