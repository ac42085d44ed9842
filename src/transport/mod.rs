//! 传输层：出入站事件与 TransportChannel 抽象
//!
//! 两种实现可互换：轮询队列（HTTP 请求 / 轮询）与 WebSocket 网关（gateway feature）；
//! ChannelTransport 供测试与进程内使用。投递至多一次，不同 requestId 之间不保证顺序。

pub mod channel;
pub mod events;
pub mod queue;

use async_trait::async_trait;
use thiserror::Error;

pub use channel::ChannelTransport;
pub use events::{ExecutionMode, InboundEvent, OutboundEvent, ToolPhase};
pub use queue::PollingQueue;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("no connected client")]
    NoClient,

    #[error("encode failed: {0}")]
    Encode(String),
}

/// 出站通道：由运行时注入给执行器与远端工具
#[async_trait]
pub trait TransportChannel: Send + Sync {
    async fn send(&self, event: OutboundEvent) -> Result<(), TransportError>;
}
