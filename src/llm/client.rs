//! 对话补全客户端：规范化 + 三层修复阶梯
//!
//! 1. 规范化后的原始消息
//! 2. 仅保留 role + 字符串 content
//! 3. 整个列表替换为一条通用求助消息
//!
//! 只有 InvalidContent 会进入阶梯；其余首次失败直接返回 ModelCallError。

use std::sync::Arc;

use crate::core::{ModelCallError, RepairTier};
use crate::llm::{ChatOptions, LlmClient};
use crate::message::{normalize_messages, AssistantMessage, Message, DEFAULT_PROMPT};
use crate::tools::ToolDescriptor;

/// 第三层使用的通用求助消息
pub const FALLBACK_PROMPT: &str = "I need help with Three.js code generation.";

/// 包装后端的对话客户端（组合而非替换后端的调用方法）
#[derive(Clone)]
pub struct ChatModelClient {
    backend: Arc<dyn LlmClient>,
    default_prompt: String,
    fallback_prompt: String,
    temperature: Option<f32>,
}

impl ChatModelClient {
    pub fn new(backend: Arc<dyn LlmClient>) -> Self {
        Self {
            backend,
            default_prompt: DEFAULT_PROMPT.to_string(),
            fallback_prompt: FALLBACK_PROMPT.to_string(),
            temperature: None,
        }
    }

    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_prompt = prompt.into();
        self
    }

    pub fn with_fallback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.fallback_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// 调用模型；tools 为空时不暴露工具
    pub async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<AssistantMessage, ModelCallError> {
        let options = ChatOptions {
            tools: tools.to_vec(),
            temperature: self.temperature,
        };

        let normalized = normalize_messages(messages, &self.default_prompt);
        let original = match self.backend.chat(&normalized, &options).await {
            Ok(reply) => return Ok(reply),
            Err(e) => e,
        };

        if !original.is_content_violation() {
            tracing::warn!(error = %original, "model call failed");
            return Err(ModelCallError::new(
                original.clone(),
                original,
                RepairTier::Initial,
            ));
        }

        tracing::warn!(error = %original, "content rejected, retrying with stripped messages");
        let stripped: Vec<Message> = normalized.iter().map(Message::stripped).collect();
        let second = match self.backend.chat(&stripped, &options).await {
            Ok(reply) => return Ok(reply),
            Err(e) => e,
        };

        tracing::warn!(error = %second, tier = %RepairTier::Stripped, "retry failed, falling back to a minimal request");
        let fallback = vec![Message::user(self.fallback_prompt.clone())];
        match self.backend.chat(&fallback, &options).await {
            Ok(reply) => Ok(reply),
            Err(last) => {
                tracing::warn!(error = %last, "fallback request failed");
                Err(ModelCallError::new(original, last, RepairTier::Fallback))
            }
        }
    }

    /// 无工具调用，只取文本
    pub async fn complete_text(&self, messages: &[Message]) -> Result<String, ModelCallError> {
        let reply = self.invoke(messages, &[]).await?;
        Ok(reply.content.unwrap_or_default())
    }
}

impl std::fmt::Debug for ChatModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModelClient")
            .field("default_prompt", &self.default_prompt)
            .field("fallback_prompt", &self.fallback_prompt)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::message::{MessageContent, Role, ToolCall};

    fn rejected() -> LlmError {
        LlmError::InvalidContent("Invalid type for 'messages[1].content'".to_string())
    }

    #[tokio::test]
    async fn test_success_on_first_call() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Ok(AssistantMessage::text("ok"))]));
        let client = ChatModelClient::new(mock.clone());
        let reply = client.invoke(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(reply.text_or_empty(), "ok");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_ladder_returns_tier_three_result() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            Err(rejected()),
            Err(rejected()),
            Ok(AssistantMessage::text("tier3")),
            Ok(AssistantMessage::text("never")),
        ]));
        let client = ChatModelClient::new(mock.clone());
        let msgs = vec![
            Message::system("sys"),
            Message::assistant_tool_calls(None, vec![ToolCall::new("c1", "validate_code", "{}")]),
        ];
        let reply = client.invoke(&msgs, &[]).await.unwrap();
        assert_eq!(reply.text_or_empty(), "tier3");
        assert_eq!(mock.call_count(), 3);

        let calls = mock.calls();
        assert!(calls[1].messages.iter().all(|m| m.tool_calls.is_none()));
        assert_eq!(calls[2].messages, vec![Message::user(FALLBACK_PROMPT)]);
    }

    #[tokio::test]
    async fn test_stripped_tier_success() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            Err(rejected()),
            Ok(AssistantMessage::text("tier2")),
        ]));
        let client = ChatModelClient::new(mock.clone());
        let reply = client.invoke(&[Message::user("x")], &[]).await.unwrap();
        assert_eq!(reply.text_or_empty(), "tier2");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_tiers_fail() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            Err(rejected()),
            Err(LlmError::Network("reset".to_string())),
            Err(LlmError::Api("still broken".to_string())),
        ]));
        let client = ChatModelClient::new(mock.clone());
        let err = client.invoke(&[Message::user("x")], &[]).await.unwrap_err();
        assert_eq!(err.tier, RepairTier::Fallback);
        assert!(err.original.is_content_violation());
        assert_eq!(err.last, LlmError::Api("still broken".to_string()));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_content_error_skips_ladder() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::RateLimited(
            "429".to_string(),
        ))]));
        let client = ChatModelClient::new(mock.clone());
        let err = client.invoke(&[Message::user("x")], &[]).await.unwrap_err();
        assert_eq!(err.tier, RepairTier::Initial);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_messages_get_default_prompt() {
        let mock = Arc::new(MockLlmClient::new());
        let client = ChatModelClient::new(mock.clone()).with_default_prompt("help me");
        client.invoke(&[], &[]).await.unwrap();
        let calls = mock.calls();
        let sent = &calls[0].messages;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].role, Role::User);
        assert_eq!(sent[0].content, MessageContent::Text("help me".to_string()));
    }
}
