//! LLM 后端抽象
//!
//! 后端（OpenAI / Azure / Mock）实现 LlmClient：接收已规范化的消息与可调用工具，返回一条 assistant 回复。
//! 错误只在后端分类一次，修复阶梯只看 LlmError 的变体。

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{AssistantMessage, Message};
use crate::tools::ToolDescriptor;

/// 后端调用失败的分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// 请求因某条消息的 content 类型不合法被拒（触发修复阶梯）
    #[error("invalid message content: {0}")]
    InvalidContent(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 按错误文本分类（async-openai 的错误只暴露文本时使用）
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if is_content_rejection(&lower) {
            LlmError::InvalidContent(message)
        } else if lower.contains("rate limit") || lower.contains("429") {
            LlmError::RateLimited(message)
        } else if lower.contains("timed out")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("error sending request")
        {
            LlmError::Network(message)
        } else {
            LlmError::Api(message)
        }
    }

    pub fn is_content_violation(&self) -> bool {
        matches!(self, LlmError::InvalidContent(_))
    }
}

fn is_content_rejection(lower: &str) -> bool {
    if lower.contains("invalid type for 'messages") {
        return true;
    }
    // 例："messages[2].content" must be a string or array
    lower
        .find("messages[")
        .map(|i| lower[i..].contains("].content"))
        .unwrap_or(false)
}

/// 单次调用的选项
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// 暴露给模型的工具（为空则不带 tools 字段）
    pub tools: Vec<ToolDescriptor>,
    pub temperature: Option<f32>,
}

impl ChatOptions {
    pub fn with_tools(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            temperature: None,
        }
    }
}

/// LLM 后端 trait：一次非流式对话补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<AssistantMessage, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
