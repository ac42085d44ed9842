//! capture_screenshot：请求浏览器截取当前画面

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::bridge::{check_remote_result, RemoteBridge};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::Tool;
use crate::transport::OutboundEvent;

fn default_quality() -> f64 {
    0.8
}

fn default_view() -> String {
    "current".to_string()
}

/// capture_screenshot 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScreenshotArgs {
    /// 图像质量 0-1
    #[serde(default = "default_quality")]
    pub quality: f64,
    /// 视角：current / front / top / side
    #[serde(default = "default_view")]
    pub view: String,
}

pub struct CaptureScreenshotTool {
    bridge: RemoteBridge,
}

impl CaptureScreenshotTool {
    pub fn new(bridge: RemoteBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Tool for CaptureScreenshotTool {
    fn name(&self) -> &str {
        "capture_screenshot"
    }

    fn description(&self) -> &str {
        "捕捉 Three.js 场景截图"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ScreenshotArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ScreenshotArgs = parse_args(args)?;
        let quality = args.quality.clamp(0.0, 1.0);
        let view = args.view;
        let result = self
            .bridge
            .dispatch(move |request_id| OutboundEvent::ScreenshotRequest {
                quality,
                view,
                request_id,
            })
            .await?;
        check_remote_result(result)
    }
}
