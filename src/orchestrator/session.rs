//! Short-lived multi-turn conversation history, keyed by `session_id`.
//!
//! Trimming drops the oldest turns first once a session's history passes
//! `max_history_items`, the same policy applied on every `save` so a
//! session can never grow unbounded.

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
