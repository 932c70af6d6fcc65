//! Session domain types.
//!
//! A session is the ordered message history plus origin metadata for one
//! `session_key`. Sessions are created on first reference, mutated only by
//! the agent loop that owns the store, and evicted LRU above a cap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::message::ChatMessage;

/// Default ceiling on live sessions before LRU eviction kicks in.
pub const DEFAULT_SESSION_CAP: usize = 1024;

/// The message history and origin metadata for one session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: String,

    /// Ordered conversation turns (system turns excluded; the system
    /// prompt is assembled fresh per message)
    pub turns: Vec<ChatMessage>,

    /// Originating channel, recorded on creation
    pub channel: String,

    /// Originating chat identifier
    pub chat_id: String,

    pub created_at: DateTime<Utc>,
    pub last_touched: DateTime<Utc>,
}

impl Session {
    pub fn new(key: impl Into<String>, channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            turns: Vec::new(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            created_at: now,
            last_touched: now,
        }
    }

    /// Append a turn and bump the touch timestamp.
    pub fn push(&mut self, turn: ChatMessage) {
        self.last_touched = Utc::now();
        self.turns.push(turn);
    }
}

/// The session table: key -> Session, LRU-evicted by `last_touched`.
///
/// Not internally locked; the agent loop wraps it in its own lock and is
/// the sole mutator, so there is exactly one writer per session key.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    cap: usize,
}

impl SessionStore {
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            cap: cap.max(1),
        }
    }

    /// Get or create the session for a key, evicting the least recently
    /// touched session when the table is at capacity.
    pub fn get_or_create(
        &mut self,
        key: &str,
        channel: &str,
        chat_id: &str,
    ) -> &mut Session {
        if !self.sessions.contains_key(key) && self.sessions.len() >= self.cap {
            if let Some(oldest) = self
                .sessions
                .values()
                .min_by_key(|s| s.last_touched)
                .map(|s| s.key.clone())
            {
                tracing::debug!(session = %oldest, "Evicting least recently used session");
                self.sessions.remove(&oldest);
            }
        }

        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key, channel, chat_id))
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAP)
    }
}
