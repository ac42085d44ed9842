//! Agent Runtime（代理运行时）
//!
//! 入站事件路由：user_input 启动一个回合，tool_result 交给请求关联器。
//! 与具体传输解耦，轮询端点与 WebSocket 网关共用同一个 Runtime。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::correlator::RequestCorrelator;
use crate::llm::{ChatModelClient, LlmClient};
use crate::react::{AgentExecutor, ReactEvent, TurnOutcome};
use crate::tools::{standard_registry, RemoteBridge, ToolExecutor};
use crate::transport::{InboundEvent, OutboundEvent, ToolPhase, TransportChannel};

/// 回合开始时推送的思考提示
const THINKING_TEXT: &str = "正在思考...";

/// Agent Runtime：持有执行器、关联器与出站通道
pub struct AgentRuntime {
    executor: Arc<AgentExecutor>,
    correlator: RequestCorrelator,
    transport: Arc<dyn TransportChannel>,
}

impl AgentRuntime {
    pub fn new(
        executor: Arc<AgentExecutor>,
        correlator: RequestCorrelator,
        transport: Arc<dyn TransportChannel>,
    ) -> Self {
        Self {
            executor,
            correlator,
            transport,
        }
    }

    /// 按配置组装：模型客户端 → 工具（远端工具经关联器与 transport）→ 执行器
    pub fn from_config(
        cfg: &AppConfig,
        backend: Arc<dyn LlmClient>,
        transport: Arc<dyn TransportChannel>,
    ) -> Self {
        let client = ChatModelClient::new(backend)
            .with_default_prompt(cfg.agent.default_prompt.clone())
            .with_fallback_prompt(cfg.llm.fallback_prompt.clone())
            .with_temperature(cfg.llm.temperature);

        let remote_timeout = Duration::from_secs(cfg.tools.remote_timeout_secs);
        let correlator = RequestCorrelator::new(remote_timeout);
        let bridge = RemoteBridge::new(correlator.clone(), Arc::clone(&transport), remote_timeout);
        let registry = standard_registry(client.clone(), bridge);
        let tools = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));

        let executor = AgentExecutor::new(client, tools)
            .with_system_prompt(cfg.system_prompt())
            .with_max_iterations(cfg.agent.max_iterations);

        Self::new(Arc::new(executor), correlator, transport)
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// 处理一个入站事件；user_input 的回合在后台运行，返回其句柄
    pub fn handle(self: &Arc<Self>, event: InboundEvent) -> Option<JoinHandle<TurnOutcome>> {
        match event {
            InboundEvent::ToolResult { request_id, result } => {
                if !self.correlator.resolve(&request_id, result) {
                    tracing::debug!(request_id = %request_id, "late or unknown tool result discarded");
                }
                None
            }
            InboundEvent::UserInput {
                content,
                chat_history,
                request_id,
            } => {
                let request_id = request_id.unwrap_or_else(RequestCorrelator::new_request_id);
                let runtime = Arc::clone(self);
                Some(tokio::spawn(async move {
                    runtime.run_turn(request_id, content, chat_history).await
                }))
            }
        }
    }

    /// 执行一个回合并推送 agent_thinking / 进度 / agent_message / agent_complete
    pub async fn run_turn(&self, request_id: String, content: Value, history: Value) -> TurnOutcome {
        self.emit(OutboundEvent::AgentThinking {
            content: THINKING_TEXT.to_string(),
            request_id: request_id.clone(),
        })
        .await;

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ReactEvent>();
        let transport = Arc::clone(&self.transport);
        let rid = request_id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                if let Some(out) = progress_event(ev, &rid) {
                    if let Err(e) = transport.send(out).await {
                        tracing::debug!(error = %e, "progress event not delivered");
                    }
                }
            }
        });

        let outcome = self
            .executor
            .invoke(&content, &history, Some(&event_tx))
            .await;
        drop(event_tx);
        if let Err(e) = forwarder.await {
            tracing::warn!(error = %e, "progress forwarder stopped");
        }

        self.emit(OutboundEvent::AgentMessage {
            content: outcome.output.clone(),
            request_id: request_id.clone(),
        })
        .await;
        self.emit(OutboundEvent::AgentComplete { request_id }).await;
        outcome
    }

    /// 关闭：所有等待中的远端调用以 Closed 失败
    pub fn shutdown(&self) {
        self.correlator.cancel_all();
    }

    async fn emit(&self, event: OutboundEvent) {
        let kind = event.kind();
        if let Err(e) = self.transport.send(event).await {
            tracing::warn!(kind, error = %e, "outbound event not delivered");
        }
    }
}

/// 过程事件 → 出站事件；StepUpdate / MessageDone 等不单独推送
pub fn progress_event(ev: ReactEvent, request_id: &str) -> Option<OutboundEvent> {
    match ev {
        ReactEvent::StepUpdate { step, max_steps } if step > 1 => Some(OutboundEvent::AgentThinking {
            content: format!("{THINKING_TEXT}（第 {step}/{max_steps} 步）"),
            request_id: request_id.to_string(),
        }),
        ReactEvent::ToolStarted { tool, .. } => Some(OutboundEvent::ToolStatus {
            request_id: request_id.to_string(),
            tool,
            phase: ToolPhase::Started,
            success: None,
        }),
        ReactEvent::ToolFinished { tool, success, .. } => Some(OutboundEvent::ToolStatus {
            request_id: request_id.to_string(),
            tool,
            phase: ToolPhase::Finished,
            success: Some(success),
        }),
        _ => None,
    }
}
