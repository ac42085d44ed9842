//! validate_code：纯本地启发式检查，不访问网络

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::sandbox::SandboxPolicy;
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::Tool;

/// 必须出现的标记
const REQUIRED_TOKENS: [&str; 2] = ["THREE", "scene.add"];

/// 违反生成规则但仍可执行的写法
const DISCOURAGED: &[(&str, &str)] = &[
    ("new THREE.Scene", "creates a new scene instead of using the existing one"),
    ("WebGLRenderer", "creates a renderer"),
    ("requestAnimationFrame", "contains a render loop"),
    ("import ", "uses import statements"),
    ("export ", "uses export statements"),
];

/// validate_code 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateCodeArgs {
    /// 要验证的 Three.js 代码
    pub code: String,
}

/// 验证结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: String,
    pub warnings: Vec<String>,
}

pub fn validate(code: &str, policy: &SandboxPolicy) -> Validation {
    let warnings: Vec<String> = DISCOURAGED
        .iter()
        .filter(|(needle, _)| code.contains(needle))
        .map(|(_, why)| why.to_string())
        .collect();

    let missing: Vec<&str> = REQUIRED_TOKENS
        .iter()
        .copied()
        .filter(|t| !code.contains(t))
        .collect();
    if !missing.is_empty() {
        return Validation {
            valid: false,
            reason: format!("missing required Three.js tokens: {}", missing.join(", ")),
            warnings,
        };
    }

    if let Err(reason) = policy.check(code) {
        return Validation {
            valid: false,
            reason,
            warnings,
        };
    }

    Validation {
        valid: true,
        reason: "code looks valid and can be executed".to_string(),
        warnings,
    }
}

pub struct ValidateCodeTool {
    policy: SandboxPolicy,
}

impl ValidateCodeTool {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ValidateCodeTool {
    fn name(&self) -> &str {
        "validate_code"
    }

    fn description(&self) -> &str {
        "检查 Three.js 代码是否可执行：必须使用 THREE 并通过 scene.add() 添加对象，且不含被禁止的调用"
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ValidateCodeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ValidateCodeArgs = parse_args(args)?;
        let v = validate(&args.code, &self.policy);
        Ok(json!({
            "success": v.valid,
            "valid": v.valid,
            "reason": v.reason,
            "warnings": v.warnings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_code() {
        let v = validate(
            "const m = new THREE.Mesh(new THREE.BoxGeometry(), new THREE.MeshBasicMaterial());\nscene.add(m);",
            &SandboxPolicy::standard(),
        );
        assert!(v.valid);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_missing_tokens() {
        let v = validate("console.log('hi')", &SandboxPolicy::standard());
        assert!(!v.valid);
        assert!(v.reason.contains("scene.add"));
    }

    #[test]
    fn test_denylisted_code_fails() {
        let v = validate("scene.add(new THREE.Mesh()); eval('x')", &SandboxPolicy::standard());
        assert!(!v.valid);
        assert!(v.reason.contains("eval"));
    }

    #[tokio::test]
    async fn test_tool_reports_warnings() {
        let tool = ValidateCodeTool::new(SandboxPolicy::standard());
        let out = tool
            .execute(json!({"code": "const r = new THREE.WebGLRenderer(); scene.add(mesh);"}))
            .await
            .unwrap();
        assert_eq!(out["valid"], true);
        assert_eq!(out["warnings"][0], "creates a renderer");
    }
}
