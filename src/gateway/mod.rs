//! WebSocket 网关
//!
//! 浏览器端通过一条 WebSocket 连接发送 user_input / tool_result，
//! 接收 agent_thinking、code_execution、agent_message 等事件。

mod hub;

pub use hub::{Hub, WsBroadcast};
