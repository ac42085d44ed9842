//! 远端工具桥：登记 requestId → 发出请求事件 → 等待浏览器回传结果
//!
//! 先登记再发送，结果即使先于 send 返回也不会丢失。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::correlator::RequestCorrelator;
use crate::core::ToolError;
use crate::transport::{OutboundEvent, TransportChannel};

#[derive(Clone)]
pub struct RemoteBridge {
    correlator: RequestCorrelator,
    transport: Arc<dyn TransportChannel>,
    timeout: Duration,
}

impl RemoteBridge {
    pub fn new(
        correlator: RequestCorrelator,
        transport: Arc<dyn TransportChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            correlator,
            transport,
            timeout,
        }
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// build 用新生成的 requestId 构造出站事件
    pub async fn dispatch<F>(&self, build: F) -> Result<Value, ToolError>
    where
        F: FnOnce(String) -> OutboundEvent,
    {
        let request_id = RequestCorrelator::new_request_id();
        let pending = self
            .correlator
            .register_with_timeout(request_id.clone(), self.timeout)?;

        let event = build(request_id.clone());
        let kind = event.kind();
        self.transport
            .send(event)
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;
        tracing::debug!(request_id = %request_id, kind, "remote request dispatched");

        Ok(pending.wait().await?)
    }
}

/// 远端结果 {success:false, error} 转为执行失败，其余原样返回
pub fn check_remote_result(result: Value) -> Result<Value, ToolError> {
    if result.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("remote execution failed")
            .to_string();
        return Err(ToolError::Execution(reason));
    }
    Ok(result)
}
