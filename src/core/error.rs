//! 错误分类
//!
//! 规范化 / 格式化失败一律就地恢复，不会越过 message 与 tools::descriptor；
//! 只有走完整个修复阶梯后的 ModelCallError 才会让一轮对话以 Failed 结束，
//! 其余错误都降级为对话内容（工具结果消息）继续本轮。

use thiserror::Error;

use crate::llm::LlmError;

/// 消息无法被修复成规范形状（内部使用，最终以空字符串 content 代替）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageFormatError {
    #[error("content nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("content could not be serialized: {0}")]
    Unserializable(String),
}

/// 修复阶梯所处的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTier {
    /// 首次调用（已规范化的原始消息）
    Initial,
    /// 仅保留 role + 字符串 content
    Stripped,
    /// 整个消息列表替换为一条通用求助消息
    Fallback,
}

impl std::fmt::Display for RepairTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepairTier::Initial => write!(f, "initial"),
            RepairTier::Stripped => write!(f, "stripped"),
            RepairTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// 对话补全调用在修复阶梯后仍失败：附带首次调用的错误与最后一次的错误
#[derive(Error, Debug, Clone)]
#[error("model call failed at {tier} tier: {original}")]
pub struct ModelCallError {
    /// 首次调用的错误（原始错误信息）
    pub original: LlmError,
    /// 最后一次尝试的错误（未进入阶梯时与 original 相同）
    pub last: LlmError,
    /// 最后到达的层级
    pub tier: RepairTier,
}

impl ModelCallError {
    pub fn new(original: LlmError, last: LlmError, tier: RepairTier) -> Self {
        Self {
            original,
            last,
            tier,
        }
    }
}

/// 工具调用失败（执行失败、超时、安全拒绝、参数错误等），会作为工具结果反馈给模型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Tool timeout: no result for request {request_id} within {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    #[error("Security violation: {0}")]
    Security(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ToolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::Timeout { .. })
    }
}

/// 请求关联器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    #[error("request {0} is already pending")]
    DuplicateRequest(String),

    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    #[error("request {0} was dropped before a result arrived")]
    Closed(String),
}

impl From<CorrelatorError> for ToolError {
    fn from(err: CorrelatorError) -> Self {
        match err {
            CorrelatorError::Timeout {
                request_id,
                timeout_ms,
            } => ToolError::Timeout {
                request_id,
                timeout_ms,
            },
            other => ToolError::Execution(other.to_string()),
        }
    }
}

/// 运行时层面的错误（配置、传输、模型调用）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    ModelCall(#[from] ModelCallError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlator_timeout_maps_to_tool_timeout() {
        let err: ToolError = CorrelatorError::Timeout {
            request_id: "x".to_string(),
            timeout_ms: 50,
        }
        .into();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_duplicate_maps_to_execution() {
        let err: ToolError = CorrelatorError::DuplicateRequest("x".to_string()).into();
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[test]
    fn test_model_call_error_display_names_tier() {
        let err = ModelCallError::new(
            LlmError::InvalidContent("messages[1].content".to_string()),
            LlmError::Network("reset".to_string()),
            RepairTier::Fallback,
        );
        let text = err.to_string();
        assert!(text.contains("fallback"));
        assert!(text.contains("messages[1].content"));
    }
}
