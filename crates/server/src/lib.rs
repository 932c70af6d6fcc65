//! Headless REST API server.
//!
//! Endpoints:
//!
//! - `POST /v1/chat/completions`      - OpenAI-shaped chat against the agent
//! - `POST /v1/skills/{skill}/execute` - run a skill by name
//! - `POST /v1/webhooks/{*path}`      - publish arbitrary webhooks inbound
//! - `GET  /v1/status`                - runtime status and recent activity
//! - `GET  /v1/skills`                - list known skills
//! - `GET  /v1/agents`                - list subagents
//! - `DELETE /v1/agents/{id}`         - kill a subagent
//! - `GET  /health`, `GET /ready`     - liveness probes
//!
//! Auth, CORS, and rate limiting are deployment middleware, not part of
//! this crate.

pub mod events;
pub mod types;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ferriclaw_agent::{AgentLoop, SkillCatalog};
use ferriclaw_core::agent::AgentHandle;
use ferriclaw_core::bus::MessageBus;
use ferriclaw_core::error::SwarmError;
use ferriclaw_core::message::InboundMessage;
use ferriclaw_swarm::SwarmManager;

use events::ActivityLog;
use types::*;

/// Public deadline for chat and skill executions.
const REQUEST_DEADLINE: Duration = Duration::from_secs(5 * 60);

pub struct ServerState {
    pub agent: Arc<AgentLoop>,
    pub swarm: Arc<SwarmManager>,
    pub bus: Arc<MessageBus>,
    pub skills: Arc<SkillCatalog>,
    pub events: ActivityLog,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(
        agent: Arc<AgentLoop>,
        swarm: Arc<SwarmManager>,
        bus: Arc<MessageBus>,
        skills: Arc<SkillCatalog>,
    ) -> SharedState {
        let state = Arc::new(Self {
            agent,
            swarm,
            bus,
            skills,
            events: ActivityLog::new(),
            started_at: Utc::now(),
        });
        state.events.record("system", "success", "Mission control initialized");
        state
    }
}

/// Build the full router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_handler))
        .route("/v1/skills/{skill}/execute", post(skill_execute_handler))
        .route("/v1/webhooks/{*path}", post(webhook_handler))
        .route("/v1/status", get(status_handler))
        .route("/v1/skills", get(list_skills_handler))
        .route("/v1/agents", get(list_agents_handler))
        .route("/v1/agents/{id}", delete(kill_agent_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(health_handler))
        .with_state(state)
}

/// Bind and serve until the token fires.
pub async fn serve(
    state: SharedState,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "API server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("invalid_request", message)),
    )
}

fn unix_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

// Handlers

async fn chat_handler(
    State(state): State<SharedState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    if req.messages.is_empty() {
        return Err(bad_request("messages array is required and must not be empty"));
    }

    let user_content = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| bad_request("at least one user message is required"))?;

    let session_key = req
        .session_key
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| format!("api-{}", unix_nanos()));
    let channel = req
        .channel
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "api".into());

    let cancel = CancellationToken::new();
    let result = tokio::time::timeout(
        REQUEST_DEADLINE,
        state
            .agent
            .process_direct_with_channel(cancel.clone(), &user_content, &session_key, &channel, "api"),
    )
    .await;

    let response = match result {
        Err(_) => {
            cancel.cancel();
            state.events.record("agent", "error", "Chat request deadline exceeded");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("processing_error", "request deadline exceeded")),
            ));
        }
        Ok(Err(e)) => {
            state
                .events
                .record("agent", "error", format!("Chat error: {e}"));
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("processing_error", e.to_string())),
            ));
        }
        Ok(Ok(response)) => response,
    };

    state.events.record("agent", "info", "Processed user request");

    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", unix_nanos()),
        object: "chat.completion".into(),
        created: Utc::now().timestamp(),
        model: req.model.unwrap_or_default(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ApiChatMessage {
                role: "assistant".into(),
                content: response,
            },
            finish_reason: "stop".into(),
        }],
    }))
}

async fn skill_execute_handler(
    State(state): State<SharedState>,
    Path(skill): Path<String>,
    Json(req): Json<SkillExecuteRequest>,
) -> Result<Json<SkillExecuteResponse>, ApiError> {
    if state.skills.load(&skill).is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "skill_not_found",
                format!("skill '{skill}' not found"),
            )),
        ));
    }

    let prompt = format!("[Using skill: {skill}]\n\n{}", req.input);
    let session_key = req
        .session_key
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| format!("skill-{skill}-{}", unix_nanos()));

    let start = std::time::Instant::now();
    let cancel = CancellationToken::new();
    let result = tokio::time::timeout(
        REQUEST_DEADLINE,
        state
            .agent
            .process_direct_with_channel(cancel.clone(), &prompt, &session_key, "api", "api"),
    )
    .await;
    let duration_ms = start.elapsed().as_millis() as i64;

    // Skill failures still answer 200; the error travels in the body.
    match result {
        Err(_) => {
            cancel.cancel();
            state
                .events
                .record("skill", "error", format!("Skill {skill} timed out"));
            Ok(Json(SkillExecuteResponse {
                skill_name: skill,
                result: String::new(),
                duration_ms,
                error: Some("request deadline exceeded".into()),
            }))
        }
        Ok(Err(e)) => {
            state
                .events
                .record("skill", "error", format!("Skill {skill} failed: {e}"));
            Ok(Json(SkillExecuteResponse {
                skill_name: skill,
                result: String::new(),
                duration_ms,
                error: Some(e.to_string()),
            }))
        }
        Ok(Ok(response)) => {
            state
                .events
                .record("skill", "success", format!("Executed skill: {skill}"));
            Ok(Json(SkillExecuteResponse {
                skill_name: skill,
                result: response,
                duration_ms,
                error: None,
            }))
        }
    }
}

async fn webhook_handler(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Json<serde_json::Value> {
    let path = format!("/{path}");

    // Malformed JSON still passes through as the raw string.
    let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();

    let header_map: std::collections::HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect();

    let event = WebhookEvent {
        path: path.clone(),
        headers: header_map,
        body: parsed,
        raw_body: body,
        timestamp: Utc::now().timestamp_millis(),
    };
    let event_json = serde_json::to_string(&event).unwrap_or_default();

    state.bus.publish_inbound(InboundMessage {
        channel: "webhook".into(),
        sender_id: "webhook".into(),
        chat_id: path.clone(),
        content: format!("[Webhook received on {path}]\n\n{event_json}"),
        session_key: Some(format!("webhook-{path}")),
    });

    state
        .events
        .record("api", "info", format!("Webhook received: {path}"));

    Json(serde_json::json!({
        "received": true,
        "path": path,
    }))
}

async fn status_handler(State(state): State<SharedState>) -> Json<StatusResponse> {
    let skills: Vec<String> = state.skills.list().into_iter().map(|s| s.name).collect();
    let total = skills.len();

    Json(StatusResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        started_at: state.started_at,
        agent: AgentStatus {
            model: state.agent.model().into(),
            tools_loaded: state.agent.tools_loaded(),
        },
        skills: SkillsStatus {
            total,
            available: total,
            names: skills,
        },
        active_agents: state.swarm.active_count(),
        recent_events: state.events.snapshot(),
        system: SystemStats {
            sessions: state.agent.session_count(),
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        },
    })
}

async fn list_skills_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let skills = state.skills.list();
    Json(serde_json::json!({
        "total": skills.len(),
        "skills": skills,
    }))
}

async fn list_agents_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let agents = state.swarm.list();
    Json(serde_json::json!({
        "count": agents.len(),
        "agents": agents,
    }))
}

async fn kill_agent_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.swarm.kill(&id) {
        Ok(()) => Ok(Json(serde_json::json!({
            "success": true,
            "message": format!("Agent {id} killed"),
        }))),
        Err(e @ SwarmError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("agent_not_found", e.to_string())),
        )),
        Err(e) => {
            warn!(id = %id, error = %e, "Kill failed");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("kill_failed", e.to_string())),
            ))
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferriclaw_agent::AgentLoopConfig;
    use ferriclaw_core::error::ProviderError;
    use ferriclaw_core::provider::{
        CompletionRequest, CompletionResponse, LlmProvider, Usage,
    };
    use ferriclaw_core::tool::ToolRegistry;
    use std::sync::Mutex;

    struct ScriptedProvider(Mutex<Vec<String>>);

    impl ScriptedProvider {
        fn new(mut responses: Vec<&str>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self(Mutex::new(
                responses.into_iter().map(String::from).collect(),
            )))
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let content = self
                .0
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
            Ok(CompletionResponse {
                content,
                tool_calls: vec![],
                usage: Some(Usage::default()),
                model: "scripted".into(),
            })
        }
    }

    fn test_state(provider: Arc<dyn LlmProvider>) -> (SharedState, tempfile::TempDir) {
        let workspace = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new());
        let registry = Arc::new(ToolRegistry::new());
        let agent = Arc::new(AgentLoop::new(
            AgentLoopConfig {
                model: "test-model".into(),
                ..Default::default()
            },
            provider.clone(),
            registry.clone(),
            bus.clone(),
            workspace.path(),
        ));
        let swarm = Arc::new(SwarmManager::new(provider, "test-model", bus.clone(), 10));
        swarm.set_registry(registry);
        let skills = Arc::new(SkillCatalog::new(workspace.path()));
        (ServerState::new(agent, swarm, bus, skills), workspace)
    }

    fn chat_request(body: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn single_turn_chat() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec!["4"]));

        let response = chat_handler(
            State(state),
            Json(chat_request(serde_json::json!({
                "messages": [{"role": "user", "content": "2+2"}],
                "session_key": "s1"
            }))),
        )
        .await
        .unwrap();

        assert_eq!(response.0.choices.len(), 1);
        assert_eq!(response.0.choices[0].message.content, "4");
        assert_eq!(response.0.choices[0].finish_reason, "stop");
        assert_eq!(response.0.object, "chat.completion");
    }

    #[tokio::test]
    async fn empty_messages_rejected() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec!["unused"]));
        let err = chat_handler(
            State(state),
            Json(chat_request(serde_json::json!({"messages": []}))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1 .0.error.code, "invalid_request");
    }

    #[tokio::test]
    async fn missing_user_role_rejected() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec!["unused"]));
        let err = chat_handler(
            State(state),
            Json(chat_request(serde_json::json!({
                "messages": [{"role": "system", "content": "be nice"}]
            }))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_is_processing_error() {
        // Empty script: the first provider call fails.
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));
        let err = chat_handler(
            State(state),
            Json(chat_request(serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}]
            }))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.1 .0.error.code, "processing_error");
    }

    #[tokio::test]
    async fn webhook_publishes_inbound() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));

        let response = webhook_handler(
            State(state.clone()),
            Path("shopify/order".into()),
            HeaderMap::new(),
            r#"{"id":7}"#.into(),
        )
        .await;

        assert_eq!(response.0["received"], serde_json::json!(true));
        assert_eq!(response.0["path"], serde_json::json!("/shopify/order"));

        let inbound = state.bus.drain().await.unwrap();
        assert_eq!(inbound.channel, "webhook");
        assert_eq!(inbound.chat_id, "/shopify/order");
        assert_eq!(inbound.session_key.as_deref(), Some("webhook-/shopify/order"));
        assert!(inbound.content.contains(r#"{"id":7}"#));
    }

    #[tokio::test]
    async fn webhook_accepts_malformed_json() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));

        let response = webhook_handler(
            State(state.clone()),
            Path("raw".into()),
            HeaderMap::new(),
            "not json at all".into(),
        )
        .await;
        assert_eq!(response.0["received"], serde_json::json!(true));

        let inbound = state.bus.drain().await.unwrap();
        assert!(inbound.content.contains("not json at all"));
    }

    #[tokio::test]
    async fn status_is_idempotent() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));

        let first = status_handler(State(state.clone())).await;
        let second = status_handler(State(state.clone())).await;
        assert_eq!(first.0.status, "ok");
        assert_eq!(first.0.agent.model, "test-model");
        assert_eq!(first.0.system.sessions, second.0.system.sessions);
        assert_eq!(
            first.0.recent_events.len(),
            second.0.recent_events.len(),
            "status reads must not record events"
        );
    }

    #[tokio::test]
    async fn skill_execute_happy_path() {
        let (state, ws) = test_state(ScriptedProvider::new(vec!["skill output"]));
        let skill_dir = ws.path().join("skills/weather");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# Weather\nsteps").unwrap();

        let response = skill_execute_handler(
            State(state),
            Path("weather".into()),
            Json(SkillExecuteRequest {
                input: "forecast for Berlin".into(),
                params: None,
                session_key: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.skill_name, "weather");
        assert_eq!(response.0.result, "skill output");
        assert!(response.0.error.is_none());
        assert!(response.0.duration_ms >= 0);
    }

    #[tokio::test]
    async fn unknown_skill_is_404() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));
        let err = skill_execute_handler(
            State(state),
            Path("missing".into()),
            Json(SkillExecuteRequest {
                input: String::new(),
                params: None,
                session_key: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(err.1 .0.error.code, "skill_not_found");
    }

    #[tokio::test]
    async fn skill_failure_still_answers_200() {
        let (state, ws) = test_state(ScriptedProvider::new(vec![]));
        let skill_dir = ws.path().join("skills/broken");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("SKILL.md"), "# Broken").unwrap();

        let response = skill_execute_handler(
            State(state),
            Path("broken".into()),
            Json(SkillExecuteRequest {
                input: "go".into(),
                params: None,
                session_key: None,
            }),
        )
        .await
        .unwrap();
        assert!(response.0.error.is_some());
        assert!(response.0.result.is_empty());
    }

    #[tokio::test]
    async fn kill_unknown_agent_is_404() {
        let (state, _ws) = test_state(ScriptedProvider::new(vec![]));
        let err = kill_agent_handler(State(state), Path("agent-99".into()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health_handler().await;
        assert_eq!(response.0["status"], serde_json::json!("ok"));
    }
}
