//! Wire types for the REST API.
//!
//! The chat surface mirrors the OpenAI chat-completions shape so existing
//! clients can point at the runtime unchanged; `session_key` and
//! `channel` are extensions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Chat completions

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ApiChatMessage>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ApiChatMessage,
    pub finish_reason: String,
}

// Skill execution

#[derive(Debug, Deserialize)]
pub struct SkillExecuteRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub session_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkillExecuteResponse {
    pub skill_name: String,
    #[serde(default)]
    pub result: String,
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Webhooks

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub path: String,
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_body: String,
    /// Unix millis
    pub timestamp: i64,
}

// Status

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub started_at: DateTime<Utc>,
    pub agent: AgentStatus,
    pub skills: SkillsStatus,
    pub active_agents: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_events: Vec<crate::events::ActivityEvent>,
    pub system: SystemStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentStatus {
    pub model: String,
    pub tools_loaded: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SkillsStatus {
    pub total: usize,
    pub available: usize,
    pub names: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStats {
    pub sessions: usize,
    pub worker_threads: usize,
}

// Errors

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: "api_error".into(),
                code: code.into(),
            },
        }
    }
}
