//! Vocel - 语音合成 Worker 服务
//!
//! 架构:
//! - Domain: worker 边界消息协议
//! - Application: ports, session（状态机）
//! - Infrastructure: http, worker, adapters, events

use std::sync::Arc;

use vocel::config::{load_config, print_config};
use vocel::infrastructure::adapters::{PiperEngine, PiperEngineConfig};
// use vocel::infrastructure::adapters::{FakeSpeechEngine, FakeSpeechEngineConfig};
use vocel::infrastructure::http::{AppState, HttpServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},vocel={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Vocel - 语音合成 Worker 服务");
    print_config(&config);

    // 确保 voices 目录存在
    tokio::fs::create_dir_all(&config.storage.voices_dir).await?;

    // 创建 Piper 引擎
    let engine_config = PiperEngineConfig {
        catalog_url: config.engine.catalog_url.clone(),
        download_base_url: config.engine.download_base_url.clone(),
        voices_dir: config.storage.voices_dir.clone(),
        piper_bin: config.engine.piper_bin.clone(),
        timeout_secs: config.engine.timeout_secs,
    };
    let engine = Arc::new(PiperEngine::new(engine_config)?);

    // // 创建 Fake 引擎（测试用，固定目录与音频）
    // let engine = Arc::new(FakeSpeechEngine::new(FakeSpeechEngineConfig::default()));

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(engine);
    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
