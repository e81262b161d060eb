use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    pub created_at: i64, // Unix timestamp
    pub expires_at: i64, // Unix timestamp
}

impl Session {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Live login sessions keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str, ttl: Duration) -> Session {
        let now = chrono::Utc::now().timestamp();
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + ttl.as_secs() as i64,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        session
    }

    /// Returns the session if it is still live. An expired entry is dropped
    /// on the way out.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let now = chrono::Utc::now().timestamp();
        let session = self.sessions.get(session_id)?.clone();
        if session.is_expired_at(now) {
            self.sessions.remove(session_id);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn purge_expired(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
