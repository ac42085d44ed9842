//! 请求关联器
//!
//! 浏览器端异步产生的工具结果按 requestId 回到等待它的那次调用。
//! requestId → 等待者 的映射只在调用未完成期间存在：结果到达、超时或等待者被丢弃时立即移除。
//! 同一 requestId 同时最多一个等待者；迟到或重复的结果直接丢弃。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::core::CorrelatorError;

type Delivery = Result<Value, CorrelatorError>;

struct Waiter {
    token: u64,
    tx: oneshot::Sender<Delivery>,
}

#[derive(Default)]
struct Inner {
    pending: Mutex<HashMap<String, Waiter>>,
    next_token: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Waiter>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 待完成请求表，可在回合处理与入站事件之间共享
#[derive(Clone)]
pub struct RequestCorrelator {
    inner: Arc<Inner>,
    default_timeout: Duration,
}

impl RequestCorrelator {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 生成新的 requestId
    pub fn new_request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// 以默认超时登记
    pub fn register(&self, request_id: impl Into<String>) -> Result<PendingRequest, CorrelatorError> {
        self.register_with_timeout(request_id, self.default_timeout)
    }

    /// 登记一个等待者；同一 requestId 已在等待时返回 DuplicateRequest
    pub fn register_with_timeout(
        &self,
        request_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<PendingRequest, CorrelatorError> {
        let request_id = request_id.into();
        let (tx, rx) = oneshot::channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.inner.lock();
            if pending.contains_key(&request_id) {
                return Err(CorrelatorError::DuplicateRequest(request_id));
            }
            pending.insert(request_id.clone(), Waiter { token, tx });
        }
        tracing::debug!(request_id = %request_id, timeout_ms = timeout.as_millis() as u64, "request registered");
        Ok(PendingRequest {
            request_id,
            token,
            timeout,
            deadline: Instant::now() + timeout,
            rx,
            inner: Arc::clone(&self.inner),
        })
    }

    /// 投递结果；找到等待者返回 true，未登记 / 已完成 / 已超时返回 false
    pub fn resolve(&self, request_id: &str, result: Value) -> bool {
        let waiter = self.inner.lock().remove(request_id);
        match waiter {
            Some(w) => {
                tracing::debug!(request_id = %request_id, "request resolved");
                // 等待者可能刚好超时离开，此时结果同样丢弃
                w.tx.send(Ok(result)).is_ok()
            }
            None => {
                tracing::debug!(request_id = %request_id, "discarding result for unknown request");
                false
            }
        }
    }

    /// 立即让某个等待者以超时失败
    pub fn expire(&self, request_id: &str) -> bool {
        let waiter = self.inner.lock().remove(request_id);
        match waiter {
            Some(w) => {
                let _ = w.tx.send(Err(CorrelatorError::Timeout {
                    request_id: request_id.to_string(),
                    timeout_ms: 0,
                }));
                true
            }
            None => false,
        }
    }

    /// 关闭时让所有等待者以 Closed 失败
    pub fn cancel_all(&self) {
        let drained: Vec<(String, Waiter)> = self.inner.lock().drain().collect();
        for (request_id, w) in drained {
            let _ = w.tx.send(Err(CorrelatorError::Closed(request_id)));
        }
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.inner.lock().contains_key(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending_count())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// register 返回的等待句柄；丢弃时自动移除对应条目
pub struct PendingRequest {
    request_id: String,
    token: u64,
    timeout: Duration,
    deadline: Instant,
    rx: oneshot::Receiver<Delivery>,
    inner: Arc<Inner>,
}

impl PendingRequest {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 等待结果，直到登记时确定的截止时间
    pub async fn wait(mut self) -> Result<Value, CorrelatorError> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(delivery)) => delivery,
            Ok(Err(_)) => Err(CorrelatorError::Closed(self.request_id.clone())),
            Err(_) => {
                self.remove_if_owned();
                tracing::warn!(
                    request_id = %self.request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(CorrelatorError::Timeout {
                    request_id: self.request_id.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn remove_if_owned(&self) {
        let mut pending = self.inner.lock();
        if pending.get(&self.request_id).map(|w| w.token) == Some(self.token) {
            pending.remove(&self.request_id);
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.remove_if_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_resolve_delivers_result() {
        let correlator = RequestCorrelator::default();
        let pending = correlator.register("abc").unwrap();
        assert!(correlator.resolve("abc", json!({"success": true})));
        assert_eq!(pending.wait().await.unwrap(), json!({"success": true}));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_repeated_is_noop() {
        let correlator = RequestCorrelator::default();
        assert!(!correlator.resolve("nobody", json!(1)));

        let pending = correlator.register("abc").unwrap();
        assert!(correlator.resolve("abc", json!(1)));
        assert!(!correlator.resolve("abc", json!(2)));
        assert_eq!(pending.wait().await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_duplicate_register_rejected() {
        let correlator = RequestCorrelator::default();
        let _first = correlator.register("dup").unwrap();
        assert_eq!(
            correlator.register("dup").err(),
            Some(CorrelatorError::DuplicateRequest("dup".to_string()))
        );
    }

    #[tokio::test]
    async fn test_timeout_removes_entry() {
        let correlator = RequestCorrelator::default();
        let pending = correlator
            .register_with_timeout("x", Duration::from_millis(50))
            .unwrap();
        let started = std::time::Instant::now();
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, CorrelatorError::Timeout { ref request_id, timeout_ms: 50 } if request_id == "x"));
        assert!(started.elapsed() >= Duration::from_millis(45));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!correlator.is_pending("x"));
        assert!(!correlator.resolve("x", json!(1)));
    }

    #[tokio::test]
    async fn test_expire_fails_waiter_with_timeout() {
        let correlator = RequestCorrelator::default();
        let pending = correlator.register("e").unwrap();
        assert!(correlator.expire("e"));
        assert!(matches!(pending.wait().await, Err(CorrelatorError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_dropped_handle_clears_entry() {
        let correlator = RequestCorrelator::default();
        let pending = correlator.register("d").unwrap();
        drop(pending);
        assert!(!correlator.is_pending("d"));
        assert!(correlator.register("d").is_ok());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let correlator = RequestCorrelator::default();
        let pending = correlator.register("c").unwrap();
        correlator.cancel_all();
        assert!(matches!(pending.wait().await, Err(CorrelatorError::Closed(_))));
    }

    #[tokio::test]
    async fn test_resolve_from_another_task() {
        let correlator = RequestCorrelator::default();
        let pending = correlator.register("remote").unwrap();
        let c = correlator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.resolve("remote", json!({"success": false, "error": "boom"}));
        });
        let result = pending.wait().await.unwrap();
        assert_eq!(result["error"], "boom");
    }
}
