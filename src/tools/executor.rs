//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute 在超时内调用 registry.execute；每次调用输出结构化审计日志（JSON）。
//! run 在此之上实施错误策略：任何失败都变成 {"success":false,"error":...} 字符串，永不中断本轮。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;

use crate::core::ToolError;
use crate::message::ToolCall;
use crate::tools::{ToolDescriptor, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并记录审计日志
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；整体超时返回 ToolError::Timeout；输出 JSON 审计日志
    pub async fn execute(
        &self,
        call_id: &str,
        tool_name: &str,
        args: Value,
    ) -> Result<Value, ToolError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = match timeout(self.timeout, self.registry.execute(tool_name, args)).await {
            Ok(r) => r,
            Err(_) => Err(ToolError::Timeout {
                request_id: call_id.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        let (ok, outcome): (bool, &str) = match &result {
            Ok(_) => (true, "ok"),
            Err(e) if e.is_timeout() => (false, "timeout"),
            Err(_) => (false, "error"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = json!({
            "event": "tool_audit",
            "tool": tool_name,
            "call_id": call_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        match &result {
            Err(e) if e.is_timeout() => {
                tracing::warn!(tool = tool_name, outcome, error = %e, "tool timed out")
            }
            Err(e) => tracing::warn!(tool = tool_name, outcome, error = %e, "tool failed"),
            Ok(_) => {}
        }

        result
    }

    /// 执行模型给出的一个工具调用，返回写入对话的字符串结果
    pub async fn run(&self, call: &ToolCall) -> ToolRun {
        let args = Value::String(call.arguments.clone());
        match self.execute(&call.id, &call.function_name, args).await {
            Ok(value) => ToolRun {
                success: reported_success(&value),
                output: render_output(value),
            },
            Err(e) => ToolRun {
                success: false,
                output: json!({"success": false, "error": e.to_string()}).to_string(),
            },
        }
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }
}

/// 一次工具调用的结果（已序列化为字符串）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub success: bool,
    pub output: String,
}

fn render_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn reported_success(value: &Value) -> bool {
    value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

fn args_preview(args: &Value) -> String {
    let s = match args {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Failing;
    struct Slow;
    struct Structured;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Err(ToolError::Execution("kaboom".to_string()))
        }
    }

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never finishes in time"
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    #[async_trait]
    impl Tool for Structured {
        fn name(&self) -> &str {
            "structured"
        }
        fn description(&self) -> &str {
            "returns an object"
        }
        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(json!({"success": true, "n": 1}))
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Failing);
        registry.register(Slow);
        registry.register(Structured);
        ToolExecutor::new(registry, timeout_secs)
    }

    #[tokio::test]
    async fn test_failure_becomes_structured_output() {
        let run = executor(5).run(&ToolCall::new("c1", "failing", "{}")).await;
        assert!(!run.success);
        let v: Value = serde_json::from_str(&run.output).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_fatal() {
        let run = executor(5).run(&ToolCall::new("c1", "missing", "{}")).await;
        assert!(!run.success);
        assert!(run.output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_overall_timeout() {
        let err = executor(1)
            .execute("c9", "slow", Value::Null)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_object_result_serialized() {
        let run = executor(5).run(&ToolCall::new("c1", "structured", "{}")).await;
        assert!(run.success);
        assert_eq!(run.output, r#"{"n":1,"success":true}"#);
    }
}
