//! OpenAI / Azure OpenAI 后端
//!
//! 通过 async_openai 调用对话补全端点。请求先拼成 JSON 再反序列化为 CreateChatCompletionRequest：
//! 规范消息的线格式与 API 完全一致，本地类型校验失败同样归为 InvalidContent，交给修复阶梯处理。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::{AzureConfig, OpenAIConfig};
use async_openai::types::chat::CreateChatCompletionRequest;
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{LlmConfig, LlmProvider};
use crate::llm::{ChatOptions, LlmClient, LlmError};
use crate::message::{AssistantMessage, Message, ToolCall};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

enum Backend {
    OpenAi(Client<OpenAIConfig>),
    Azure(Client<AzureConfig>),
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    backend: Backend,
    model: String,
    temperature: f32,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            backend: Backend::OpenAi(Client::with_config(config)),
            model: model.to_string(),
            temperature: 0.0,
            usage: TokenUsage::new(),
        }
    }

    /// Azure 部署：endpoint + deployment + api_version，密钥取 AZURE_OPENAI_API_KEY
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: Option<&str>,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("AZURE_OPENAI_API_KEY").ok())
            .unwrap_or_default();

        let config = AzureConfig::new()
            .with_api_base(endpoint)
            .with_api_version(api_version)
            .with_deployment_id(deployment)
            .with_api_key(api_key);

        Self {
            backend: Backend::Azure(Client::with_config(config)),
            model: deployment.to_string(),
            temperature: 0.0,
            usage: TokenUsage::new(),
        }
    }

    pub fn from_config(cfg: &LlmConfig) -> Self {
        let client = match cfg.provider {
            LlmProvider::OpenAi => Self::new(cfg.base_url.as_deref(), &cfg.model, None),
            LlmProvider::Azure => Self::azure(
                &cfg.azure.endpoint,
                &cfg.azure.deployment,
                &cfg.azure.api_version,
                None,
            ),
        };
        client.with_temperature(cfg.temperature)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.temperature),
        });
        if !options.tools.is_empty() {
            let tools: Vec<Value> = options.tools.iter().map(|t| t.to_function_spec()).collect();
            body["tools"] = Value::Array(tools);
        }
        serde_json::from_value(body).map_err(|e| LlmError::InvalidContent(e.to_string()))
    }
}

/// 从 API 回复的 message 对象取出文本与工具调用
pub(crate) fn parse_response_message(message: &Value) -> AssistantMessage {
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(String::from);
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .map(|c| {
                    let function = c.get("function");
                    ToolCall::new(
                        c.get("id").and_then(Value::as_str).unwrap_or_default(),
                        function
                            .and_then(|f| f.get("name"))
                            .and_then(Value::as_str)
                            .unwrap_or_default(),
                        function
                            .and_then(|f| f.get("arguments"))
                            .and_then(Value::as_str)
                            .unwrap_or("{}"),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    AssistantMessage {
        content,
        tool_calls,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<AssistantMessage, LlmError> {
        let request = self.build_request(messages, options)?;

        let response = match &self.backend {
            Backend::OpenAi(client) => client.chat().create(request).await,
            Backend::Azure(client) => client.chat().create(request).await,
        }
        .map_err(|e| LlmError::classify(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        let message = serde_json::to_value(&choice.message)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(parse_response_message(&message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDescriptor;

    #[test]
    fn test_parse_response_with_tool_calls() {
        let msg = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "generate_code", "arguments": "{\"description\":\"cube\"}"}
            }]
        });
        let parsed = parse_response_message(&msg);
        assert!(parsed.content.is_none());
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].function_name, "generate_code");
    }

    #[test]
    fn test_build_request_accepts_canonical_messages() {
        let client = OpenAiClient::new(Some("http://localhost:1"), "gpt-4o", Some("sk-test"));
        let options = ChatOptions::with_tools(vec![ToolDescriptor::new(
            "validate_code",
            "Validate code",
            json!({"type": "object", "properties": {"code": {"type": "string"}}, "required": ["code"]}),
        )]);
        let msgs = vec![
            Message::system("sys"),
            Message::user("make a cube"),
            Message::assistant_tool_calls(None, vec![ToolCall::new("c1", "validate_code", "{}")]),
            Message::tool("c1", "validate_code", r#"{"valid":true}"#),
        ];
        assert!(client.build_request(&msgs, &options).is_ok());
    }
}
