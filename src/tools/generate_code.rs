//! generate_code：调用模型按描述生成 Three.js 代码（不触碰远端场景）

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::llm::ChatModelClient;
use crate::message::Message;
use crate::react::prompt::{code_request, strip_code_fences, CODE_GENERATION_PROMPT};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::Tool;

#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        }
    }
}

/// generate_code 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateCodeArgs {
    /// 要生成的场景或对象的自然语言描述
    pub description: String,
    /// 复杂度：simple / medium / complex
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

pub struct GenerateCodeTool {
    client: ChatModelClient,
}

impl GenerateCodeTool {
    pub fn new(client: ChatModelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GenerateCodeTool {
    fn name(&self) -> &str {
        "generate_code"
    }

    fn description(&self) -> &str {
        "根据描述生成 Three.js 代码（直接使用已存在的 scene 变量），返回纯 JavaScript 源码"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<GenerateCodeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: GenerateCodeArgs = parse_args(args)?;
        if args.description.trim().is_empty() {
            return Err(ToolError::InvalidArguments("description is empty".to_string()));
        }
        let complexity = args.complexity.unwrap_or_default();
        let messages = vec![
            Message::system(CODE_GENERATION_PROMPT),
            Message::user(code_request(&args.description, complexity.as_str())),
        ];
        let reply = self
            .client
            .complete_text(&messages)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let code = strip_code_fences(&reply);
        if code.is_empty() {
            return Err(ToolError::Execution("model returned no code".to_string()));
        }
        Ok(Value::String(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::message::AssistantMessage;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generates_and_strips_fences() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Ok(AssistantMessage::text(
            "```js\nconst cube = new THREE.Mesh(g, m);\nscene.add(cube);\n```",
        ))]));
        let tool = GenerateCodeTool::new(ChatModelClient::new(mock.clone()));
        let out = tool
            .execute(json!({"description": "a red cube", "complexity": "simple"}))
            .await
            .unwrap();
        assert_eq!(out, json!("const cube = new THREE.Mesh(g, m);\nscene.add(cube);"));

        let calls = mock.calls();
        assert!(calls[0].tool_names.is_empty());
        assert!(calls[0].messages[1].content.to_text().contains("a red cube"));
    }

    #[tokio::test]
    async fn test_model_failure_is_tool_error() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::Network(
            "down".to_string(),
        ))]));
        let tool = GenerateCodeTool::new(ChatModelClient::new(mock));
        let err = tool.execute(json!({"description": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[test]
    fn test_schema_requires_description() {
        let schema = args_schema::<GenerateCodeArgs>();
        assert_eq!(schema["required"], json!(["description"]));
    }
}
