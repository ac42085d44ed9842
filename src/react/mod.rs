//! 认知层：回合状态机、工具调用记录、过程事件与提示词

pub mod events;
pub mod loop_;
pub mod prompt;
pub mod scratchpad;

pub use events::ReactEvent;
pub use loop_::{AgentExecutor, TurnOutcome, TurnState, DEFAULT_MAX_ITERATIONS, USER_SAFE_ERROR};
pub use scratchpad::{ScratchEntry, ScratchStep, Scratchpad};
