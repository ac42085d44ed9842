//! 可观测性

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 安装 tracing 订阅者：RUST_LOG 优先，默认 info；重复调用不会 panic
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
