//! HTTP 轮询端点
//!
//! - POST /api/chat：提交 user_input，回合在后台运行，立即返回 requestId
//! - GET  /api/messages：取走队列中全部未过期的出站事件
//! - POST /api/toolResponse：浏览器回传远端工具结果

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::correlator::RequestCorrelator;
use crate::llm::LlmClient;
use crate::runtime::AgentRuntime;
use crate::transport::{InboundEvent, OutboundEvent, PollingQueue};

pub struct WebState {
    runtime: Arc<AgentRuntime>,
    queue: Arc<PollingQueue>,
}

impl WebState {
    pub fn new(cfg: &AppConfig, backend: Arc<dyn LlmClient>) -> Self {
        let queue = Arc::new(PollingQueue::new(cfg.gateway.message_ttl_secs));
        let runtime = Arc::new(AgentRuntime::from_config(cfg, backend, queue.clone()));
        Self { runtime, queue }
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "message")]
    pub content: Value,
    #[serde(rename = "chatHistory", default)]
    pub chat_history: Value,
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatAccepted {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(default)]
    pub result: Value,
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/messages", get(api_messages))
        .route("/api/toolResponse", post(api_tool_response))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

async fn api_chat(
    State(state): State<Arc<WebState>>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatAccepted>) {
    let request_id = req
        .request_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(RequestCorrelator::new_request_id);
    tracing::info!(request_id = %request_id, "chat request accepted");

    let _ = state.runtime.handle(InboundEvent::UserInput {
        content: req.content,
        chat_history: req.chat_history,
        request_id: Some(request_id.clone()),
    });
    (StatusCode::ACCEPTED, Json(ChatAccepted { request_id }))
}

async fn api_messages(State(state): State<Arc<WebState>>) -> Json<Vec<OutboundEvent>> {
    Json(state.queue.drain())
}

async fn api_tool_response(
    State(state): State<Arc<WebState>>,
    Json(resp): Json<ToolResponse>,
) -> StatusCode {
    let delivered = state
        .runtime
        .correlator()
        .resolve(&resp.request_id, resp.result);
    if delivered {
        StatusCode::OK
    } else {
        tracing::debug!(request_id = %resp.request_id, "tool response for unknown request");
        StatusCode::NOT_FOUND
    }
}
