//! 进程内传输：出站事件写入 mpsc，用于测试与嵌入式宿主

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{OutboundEvent, TransportChannel, TransportError};

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TransportChannel for ChannelTransport {
    async fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        self.tx.send(event).map_err(|_| TransportError::Closed)
    }
}
