//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预先排好的回复或错误；脚本用完后回显最后一条 user 消息作为最终回答。
//! 每次调用的消息与工具列表都会被记录，便于断言修复阶梯与执行器行为。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatOptions, LlmClient, LlmError};
use crate::message::{AssistantMessage, Message, Role, ToolCall};

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<AssistantMessage, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    repeat_last: Option<AssistantMessage>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定结果
    pub fn scripted(responses: Vec<Result<AssistantMessage, LlmError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// 每次都返回同一条回复（用于迭代上限测试）
    pub fn always(response: AssistantMessage) -> Self {
        Self {
            repeat_last: Some(response),
            ..Self::default()
        }
    }

    /// 便捷构造：请求调用一个工具
    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> AssistantMessage {
        AssistantMessage::with_tool_calls(vec![ToolCall::new(id, name, arguments.to_string())])
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<AssistantMessage, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                tool_names: options.tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(result) = next {
            return result;
        }
        if let Some(response) = &self.repeat_last {
            return Ok(response.clone());
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.to_text())
            .unwrap_or_else(|| "(no input)".to_string());
        Ok(AssistantMessage::text(format!("Echo from Mock: {}", last_user)))
    }
}
