//! Scene Agent 网关
//!
//! 运行方式：
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --bin scene-agent
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use scene_agent::config::load_config;
use scene_agent::gateway::Hub;
use scene_agent::llm::OpenAiClient;
use scene_agent::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let backend = Arc::new(OpenAiClient::from_config(&cfg.llm));

    let hub = Hub::new(&cfg, backend);
    let addr = hub.start().await.context("Failed to start gateway")?;

    tracing::info!(provider = ?cfg.llm.provider, model = %cfg.llm.model, "Scene agent ready on ws://{}", addr);
    tracing::info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;

    tracing::info!("Shutting down gateway...");
    hub.stop().await;

    Ok(())
}
