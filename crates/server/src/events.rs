//! Bounded activity event log for the status endpoint.
//!
//! One log per server, constructor-injected. Keeps the most recent 50
//! events; older entries fall off the front.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_EVENTS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    /// "info", "warning", "error", "success"
    #[serde(rename = "type")]
    pub kind: String,
    /// "agent", "api", "skill", "system"
    pub source: String,
    pub message: String,
}

#[derive(Default)]
pub struct ActivityLog {
    events: Mutex<VecDeque<ActivityEvent>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source: &str, kind: &str, message: impl Into<String>) {
        let mut events = self.events.lock().expect("activity log lock poisoned");
        if events.len() >= MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(ActivityEvent {
            timestamp: Utc::now(),
            kind: kind.into(),
            source: source.into(),
            message: message.into(),
        });
    }

    /// Recent events, newest first.
    pub fn snapshot(&self) -> Vec<ActivityEvent> {
        self.events
            .lock()
            .expect("activity log lock poisoned")
            .iter()
            .rev()
            .cloned()
            .collect()
    }
}
