//! 回合过程事件：用于向前端推送思考、工具开始 / 结束等进度

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 步数更新（当前第几步）
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用 LLM 思考
    Thinking,
    /// 开始调用工具
    ToolStarted { call_id: String, tool: String },
    /// 工具返回
    ToolFinished {
        call_id: String,
        tool: String,
        success: bool,
    },
    /// 达到迭代上限，强制收尾
    IterationLimit { max_steps: usize },
    /// 最终回复
    MessageDone { text: String },
    /// 错误（用户可见文本）
    Error { text: String },
}
