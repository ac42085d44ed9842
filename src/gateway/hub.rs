//! Hub：WebSocket 网关
//!
//! 每个连接一个读循环 + 一个写任务；出站事件以 JSON 文本帧广播给全部连接，
//! 入站帧解析为 InboundEvent 后交给 AgentRuntime。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::runtime::AgentRuntime;
use crate::transport::{InboundEvent, OutboundEvent, TransportChannel, TransportError};

type Connections = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>;

/// 出站广播：作为 TransportChannel 注入给运行时
#[derive(Clone, Default)]
pub struct WsBroadcast {
    connections: Connections,
}

impl WsBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn add(&self, client_id: String, tx: mpsc::UnboundedSender<String>) {
        self.connections.write().await.insert(client_id, tx);
    }

    async fn remove(&self, client_id: &str) {
        self.connections.write().await.remove(client_id);
    }

    async fn clear(&self) {
        self.connections.write().await.clear();
    }
}

#[async_trait]
impl TransportChannel for WsBroadcast {
    async fn send(&self, event: OutboundEvent) -> Result<(), TransportError> {
        let json = encode(&event)?;
        let connections = self.connections.read().await;
        if connections.is_empty() {
            return Err(TransportError::NoClient);
        }
        for tx in connections.values() {
            let _ = tx.send(json.clone());
        }
        Ok(())
    }
}

fn encode(event: &OutboundEvent) -> Result<String, TransportError> {
    serde_json::to_string(event).map_err(|e| TransportError::Encode(e.to_string()))
}

/// Hub（网关中枢）
pub struct Hub {
    bind_addr: String,
    runtime: Arc<AgentRuntime>,
    broadcast: WsBroadcast,
    shutdown: watch::Sender<bool>,
}

impl Hub {
    pub fn new(cfg: &AppConfig, backend: Arc<dyn LlmClient>) -> Self {
        let broadcast = WsBroadcast::new();
        let runtime = Arc::new(AgentRuntime::from_config(
            cfg,
            backend,
            Arc::new(broadcast.clone()),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            bind_addr: cfg.gateway.bind_addr.clone(),
            runtime,
            broadcast,
            shutdown: shutdown_tx,
        }
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }

    /// 启动网关，返回实际监听地址（bind_addr 端口为 0 时由系统分配）
    pub async fn start(&self) -> Result<SocketAddr, AgentError> {
        let addr: SocketAddr = self
            .bind_addr
            .parse()
            .map_err(|e| AgentError::ConfigError(format!("Invalid bind address: {}", e)))?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AgentError::Transport(format!("Failed to bind: {}", e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        tracing::info!("Gateway listening on ws://{}", local);

        let mut shutdown_rx = self.shutdown.subscribe();
        let broadcast = self.broadcast.clone();
        let runtime = Arc::clone(&self.runtime);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let broadcast = broadcast.clone();
                                let runtime = Arc::clone(&runtime);
                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(stream, addr, broadcast, runtime).await {
                                        tracing::error!("Connection error from {}: {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                }
            }
        });

        Ok(local)
    }

    /// 停止网关：不再接受连接，挂起的远端调用以 Closed 失败
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.runtime.shutdown();
        self.broadcast.clear().await;
    }

    pub async fn connection_count(&self) -> usize {
        self.broadcast.connection_count().await
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    broadcast: WsBroadcast,
    runtime: Arc<AgentRuntime>,
) -> Result<(), String> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let client_id = format!("ws_{}", uuid::Uuid::new_v4());
    tracing::info!(client_id = %client_id, "New WebSocket connection from {}", addr);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    broadcast.add(client_id.clone(), tx.clone()).await;
    reply(
        &tx,
        OutboundEvent::ConnectionEstablished {
            client_id: client_id.clone(),
        },
    );

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => match serde_json::from_str::<InboundEvent>(&text) {
                Ok(event) => {
                    // 回合在后台运行，读循环继续接收 tool_result
                    let _ = runtime.handle(event);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable frame");
                    reply(
                        &tx,
                        OutboundEvent::Error {
                            message: format!("invalid message: {}", e),
                        },
                    );
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    broadcast.remove(&client_id).await;
    tracing::info!("WebSocket connection closed: {}", addr);
    Ok(())
}

/// 只发给当前连接
fn reply(tx: &mpsc::UnboundedSender<String>, event: OutboundEvent) {
    if let Ok(json) = encode(&event) {
        let _ = tx.send(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use serde_json::{json, Value};

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_clients() {
        let broadcast = WsBroadcast::new();
        let err = broadcast
            .send(OutboundEvent::Error {
                message: "x".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NoClient);
    }

    #[tokio::test]
    async fn test_round_trip_over_websocket() {
        let mut cfg = AppConfig::default();
        cfg.gateway.bind_addr = "127.0.0.1:0".to_string();
        let hub = Hub::new(&cfg, Arc::new(MockLlmClient::new()));
        let addr = hub.start().await.unwrap();

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();

        let hello = next_json(&mut ws).await;
        assert_eq!(hello["type"], "connection_established");
        assert!(hello["clientId"].as_str().unwrap().starts_with("ws_"));

        ws.send(WsMessage::Text("not json".to_string())).await.unwrap();
        let err = next_json(&mut ws).await;
        assert_eq!(err["type"], "error");

        let input = json!({"type": "user_input", "content": "hi", "requestId": "r1"});
        ws.send(WsMessage::Text(input.to_string())).await.unwrap();

        let mut kinds = Vec::new();
        loop {
            let ev = next_json(&mut ws).await;
            assert_eq!(ev["requestId"], "r1");
            let kind = ev["type"].as_str().unwrap().to_string();
            if kind == "agent_message" {
                assert_eq!(ev["content"], "Echo from Mock: hi");
            }
            let done = kind == "agent_complete";
            kinds.push(kind);
            if done {
                break;
            }
        }
        assert_eq!(kinds, vec!["agent_thinking", "agent_message", "agent_complete"]);

        hub.stop().await;
    }
}
