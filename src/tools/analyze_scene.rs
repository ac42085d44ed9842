//! analyze_scene：请求浏览器回报场景结构

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::bridge::{check_remote_result, RemoteBridge};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::Tool;
use crate::transport::OutboundEvent;

fn default_detail() -> String {
    "basic".to_string()
}

/// analyze_scene 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeSceneArgs {
    /// 分析详细程度：basic / detailed
    #[serde(default = "default_detail")]
    pub detail: String,
    /// 关注的特定对象或属性
    #[serde(default)]
    pub focus: Option<String>,
}

pub struct AnalyzeSceneTool {
    bridge: RemoteBridge,
}

impl AnalyzeSceneTool {
    pub fn new(bridge: RemoteBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Tool for AnalyzeSceneTool {
    fn name(&self) -> &str {
        "analyze_scene"
    }

    fn description(&self) -> &str {
        "分析 Three.js 场景结构（对象、材质、灯光等）"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<AnalyzeSceneArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let AnalyzeSceneArgs { detail, focus } = parse_args(args)?;
        let result = self
            .bridge
            .dispatch(move |request_id| OutboundEvent::SceneAnalysisRequest {
                detail,
                focus,
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

    #[tokio::test]
    async fn test_focus_forwarded_and_failure_reported() {
        let (transport, mut rx) = ChannelTransport::new();
        let correlator = RequestCorrelator::default();
        let bridge = RemoteBridge::new(correlator.clone(), Arc::new(transport), Duration::from_secs(5));
        let tool = AnalyzeSceneTool::new(bridge);

        let harness = tokio::spawn(async move {
            let ev = rx.recv().await.unwrap();
            let OutboundEvent::SceneAnalysisRequest { detail, focus, request_id } = ev else {
                panic!("expected scene_analysis_request");
            };
            assert_eq!(detail, "basic");
            assert_eq!(focus.as_deref(), Some("lights"));
            correlator.resolve(&request_id, json!({"success": false, "error": "scene not ready"}));
        });

        let err = tool.execute(json!({"focus": "lights"})).await.unwrap_err();
        assert_eq!(err, ToolError::Execution("scene not ready".to_string()));
        harness.await.unwrap();
    }
}
