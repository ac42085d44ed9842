//! execute_code：把代码交给浏览器端求值器执行，本进程从不执行代码
//!
//! 黑名单检查先于派发；违规直接以安全错误失败。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::sandbox::SandboxPolicy;
use crate::tools::bridge::{check_remote_result, RemoteBridge};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::Tool;
use crate::transport::{ExecutionMode, OutboundEvent};

/// execute_code 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteCodeArgs {
    /// 要执行的 Three.js 代码（纯 JavaScript）
    pub code: String,
    /// replace 替换当前场景，append 添加到当前场景
    #[serde(default)]
    pub mode: ExecutionMode,
}

pub struct ExecuteCodeTool {
    bridge: RemoteBridge,
    policy: SandboxPolicy,
}

impl ExecuteCodeTool {
    pub fn new(bridge: RemoteBridge, policy: SandboxPolicy) -> Self {
        Self { bridge, policy }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "在浏览器中执行 Three.js 代码并返回执行结果（success / error / sceneInfo）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ExecuteCodeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ExecuteCodeArgs = parse_args(args)?;
        if args.code.trim().is_empty() {
            return Err(ToolError::InvalidArguments("code is empty".to_string()));
        }
        self.policy.check(&args.code).map_err(ToolError::Security)?;

        let ExecuteCodeArgs { code, mode } = args;
        let result = self
            .bridge
            .dispatch(move |request_id| OutboundEvent::CodeExecution {
                code,
                mode,
                request_id,
            })
            .await?;
        check_remote_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::RequestCorrelator;
    use crate::transport::ChannelTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn tool() -> (ExecuteCodeTool, tokio::sync::mpsc::UnboundedReceiver<OutboundEvent>, RequestCorrelator) {
        let (transport, rx) = ChannelTransport::new();
        let correlator = RequestCorrelator::default();
        let bridge = RemoteBridge::new(correlator.clone(), Arc::new(transport), Duration::from_secs(5));
        (ExecuteCodeTool::new(bridge, SandboxPolicy::standard()), rx, correlator)
    }

    #[tokio::test]
    async fn test_forbidden_code_never_dispatched() {
        let (tool, mut rx, _) = tool();
        let err = tool
            .execute(json!({"code": "fetch('/steal')"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_split_forbidden_call_never_dispatched() {
        let (tool, mut rx, _) = tool();
        let err = tool
            .execute(json!({"code": "scene.add(m);\nfetch\n('/steal')"}))
            .await
            .unwrap_err();
        match err {
            ToolError::Security(msg) => assert!(msg.contains("fetch()")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatches_code_execution_and_returns_result() {
        let (tool, mut rx, correlator) = tool();
        let harness = tokio::spawn(async move {
            let ev = rx.recv().await.unwrap();
            match &ev {
                OutboundEvent::CodeExecution { mode, code, request_id } => {
                    assert_eq!(*mode, ExecutionMode::Append);
                    assert_eq!(code, "scene.add(new THREE.Mesh())");
                    correlator.resolve(request_id, json!({"success": true, "sceneInfo": {"objects": 1}}));
                }
                other => panic!("unexpected event {:?}", other),
            }
        });
        let out = tool
            .execute(json!({"code": "scene.add(new THREE.Mesh())", "mode": "append"}))
            .await
            .unwrap();
        assert_eq!(out["sceneInfo"]["objects"], 1);
        harness.await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_failure_is_execution_error() {
        let (tool, mut rx, correlator) = tool();
        tokio::spawn(async move {
            if let Some(ev) = rx.recv().await {
                let id = ev.request_id().unwrap_or_default().to_string();
                correlator.resolve(&id, json!({"success": false, "error": "THREE is not defined"}));
            }
        });
        let err = tool.execute(json!({"code": "scene.add(x)"})).await.unwrap_err();
        assert_eq!(err, ToolError::Execution("THREE is not defined".to_string()));
    }
}
