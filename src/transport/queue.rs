//! 轮询传输：出站事件排队，客户端每次轮询取走全部未过期事件

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::transport::{OutboundEvent, TransportChannel, TransportError};

/// 带时间戳的出站事件队列
#[derive(Debug)]
pub struct PollingQueue {
    events: Mutex<VecDeque<(DateTime<Utc>, OutboundEvent)>>,
    ttl: Duration,
}

impl PollingQueue {
    /// 超出 chrono 可表示范围的 TTL 视为永不过期
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            events: Mutex::new(VecDeque::new()),
            ttl,
        }
    }

    fn cutoff(&self) -> Option<DateTime<Utc>> {
        Utc::now().checked_sub_signed(self.ttl)
    }

    pub(crate) fn push_at(&self, event: OutboundEvent, at: DateTime<Utc>) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_back((at, event));
        if let Some(cutoff) = self.cutoff() {
            prune(&mut events, cutoff);
        }
    }

    /// 返回并清空队列（过期事件先被丢弃）
    pub fn drain(&self) -> Vec<OutboundEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cutoff) = self.cutoff() {
            prune(&mut events, cutoff);
        }
        events.drain(..).map(|(_, ev)| ev).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune(events: &mut VecDeque<(DateTime<Utc>, OutboundEvent)>, cutoff: DateTime<Utc>) {
    let before = events.len();
    events.retain(|(at, _)| *at >= cutoff);
    let dropped = before - events.len();
    if dropped > 0 {
        tracing::debug!(dropped, "expired queued events");
    }
}

#[async_trait]
impl TransportChannel for PollingQueue {
    async fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        self.push_at(event, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(id: &str) -> OutboundEvent {
        OutboundEvent::AgentComplete {
            request_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_drain_returns_in_order_and_clears() {
        let queue = PollingQueue::new(30);
        queue.send(complete("a")).await.unwrap();
        queue.send(complete("b")).await.unwrap();
        assert_eq!(queue.drain(), vec![complete("a"), complete("b")]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_expired_events_dropped() {
        let queue = PollingQueue::new(30);
        queue.push_at(complete("old"), Utc::now() - Duration::seconds(31));
        queue.push_at(complete("new"), Utc::now());
        assert_eq!(queue.drain(), vec![complete("new")]);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        for ttl in [u64::MAX, i64::MAX as u64, 1 << 40] {
            let queue = PollingQueue::new(ttl);
            queue.push_at(complete("old"), Utc::now() - Duration::days(365));
            queue.send(complete("new")).await.unwrap();
            assert_eq!(queue.drain(), vec![complete("old"), complete("new")]);
        }
    }
}
