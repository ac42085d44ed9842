pub mod analyze_scene;
pub mod bridge;
pub mod descriptor;
pub mod execute_code;
pub mod executor;
pub mod generate_code;
pub mod registry;
pub mod schema;
pub mod screenshot;
pub mod validate_code;

pub use analyze_scene::AnalyzeSceneTool;
pub use bridge::RemoteBridge;
pub use descriptor::{format_tools, ToolDescriptor};
pub use execute_code::ExecuteCodeTool;
pub use executor::{ToolExecutor, ToolRun};
pub use generate_code::GenerateCodeTool;
pub use registry::{Tool, ToolRegistry};
pub use schema::{args_schema, parse_args};
pub use screenshot::CaptureScreenshotTool;
pub use validate_code::ValidateCodeTool;

use crate::llm::ChatModelClient;
use crate::sandbox::SandboxPolicy;

/// 五个标准工具：generate_code / execute_code / validate_code / capture_screenshot / analyze_scene
pub fn standard_registry(client: ChatModelClient, bridge: RemoteBridge) -> ToolRegistry {
    let policy = SandboxPolicy::standard();
    let mut registry = ToolRegistry::new();
    registry.register(GenerateCodeTool::new(client));
    registry.register(ExecuteCodeTool::new(bridge.clone(), policy.clone()));
    registry.register(ValidateCodeTool::new(policy));
    registry.register(CaptureScreenshotTool::new(bridge.clone()));
    registry.register(AnalyzeSceneTool::new(bridge));
    registry
}
