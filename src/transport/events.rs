//! 传输层事件（JSON 线格式，字段名与浏览器端一致）

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 代码执行模式：替换当前场景内容或追加
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Replace,
    Append,
}

/// 工具进度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Started,
    Finished,
}

/// 发往客户端的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    AgentThinking {
        content: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    AgentMessage {
        content: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    AgentComplete {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    /// 请求浏览器执行代码
    CodeExecution {
        code: String,
        mode: ExecutionMode,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    ScreenshotRequest {
        quality: f64,
        view: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    SceneAnalysisRequest {
        detail: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus: Option<String>,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    ToolStatus {
        #[serde(rename = "requestId")]
        request_id: String,
        tool: String,
        phase: ToolPhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
    ConnectionEstablished {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Error {
        message: String,
    },
}

impl OutboundEvent {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            OutboundEvent::AgentThinking { request_id, .. }
            | OutboundEvent::AgentMessage { request_id, .. }
            | OutboundEvent::AgentComplete { request_id }
            | OutboundEvent::CodeExecution { request_id, .. }
            | OutboundEvent::ScreenshotRequest { request_id, .. }
            | OutboundEvent::SceneAnalysisRequest { request_id, .. }
            | OutboundEvent::ToolStatus { request_id, .. } => Some(request_id),
            OutboundEvent::ConnectionEstablished { .. } | OutboundEvent::Error { .. } => None,
        }
    }

    /// 事件类型名（日志用）
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::AgentThinking { .. } => "agent_thinking",
            OutboundEvent::AgentMessage { .. } => "agent_message",
            OutboundEvent::AgentComplete { .. } => "agent_complete",
            OutboundEvent::CodeExecution { .. } => "code_execution",
            OutboundEvent::ScreenshotRequest { .. } => "screenshot_request",
            OutboundEvent::SceneAnalysisRequest { .. } => "scene_analysis_request",
            OutboundEvent::ToolStatus { .. } => "tool_status",
            OutboundEvent::ConnectionEstablished { .. } => "connection_established",
            OutboundEvent::Error { .. } => "error",
        }
    }
}

/// 客户端发来的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    UserInput {
        #[serde(default)]
        content: Value,
        #[serde(rename = "chatHistory", default)]
        chat_history: Value,
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(alias = "tool_response")]
    ToolResult {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default)]
        result: Value,
    },
}

impl InboundEvent {
    pub fn user_input(content: impl Into<String>) -> Self {
        InboundEvent::UserInput {
            content: Value::String(content.into()),
            chat_history: Value::Null,
            request_id: None,
        }
    }

    pub fn tool_result(request_id: impl Into<String>, result: Value) -> Self {
        InboundEvent::ToolResult {
            request_id: request_id.into(),
            result,
        }
    }
}
