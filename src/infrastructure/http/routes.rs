//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping    GET  健康检查
//! - /ws/worker   WS   Worker 消息协议边界（每连接一个 worker 实例）

use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ping", get(handlers::ping))
        .route("/ws/worker", get(handlers::worker_socket_handler))
}
