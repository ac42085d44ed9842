//! Scene Agent HTTP 轮询服务
//!
//! 启动: cargo run --bin scene-agent-web --features web

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use scene_agent::config::load_config;
use scene_agent::llm::OpenAiClient;
use scene_agent::observability;
use scene_agent::web::{router, WebState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let backend = Arc::new(OpenAiClient::from_config(&cfg.llm));

    let state = Arc::new(WebState::new(&cfg, backend));
    let app = router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&cfg.gateway.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.gateway.bind_addr))?;
    tracing::info!("Scene agent web listening on http://{}", cfg.gateway.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    state.runtime().shutdown();
    Ok(())
}
