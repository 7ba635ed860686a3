//! Worker Socket Handler - 宿主与 worker 的边界桥接
//!
//! 每个 WebSocket 连接对应一个独立的 SpeechWorker：
//! 文本帧原样送入 worker 入站队列（解析与丢弃由路由器负责），
//! 出站消息序列化为 JSON 文本帧推回宿主。连接关闭即 worker 终止。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use crate::infrastructure::http::state::AppState;
use crate::infrastructure::worker::{SpeechWorker, SpeechWorkerConfig, SpeechWorkerHandle};

/// Worker WebSocket 连接处理
pub async fn worker_socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_worker_socket(socket, state))
}

async fn handle_worker_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    let SpeechWorkerHandle {
        inbound,
        mut outbound,
    } = SpeechWorker::spawn(state.engine.clone(), SpeechWorkerConfig::default());

    tracing::info!(connection_id = %connection_id, "Worker socket connected");

    // 出站转发任务
    let connection_id_for_forward = connection_id;
    let forward_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    connection_id = %connection_id_for_forward,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
    });

    // 入站转发任务
    let connection_id_for_receive = connection_id;
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(raw)) => {
                    if inbound.send(raw).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(
                        connection_id = %connection_id_for_receive,
                        "Worker socket closed by host"
                    );
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id_for_receive,
                        error = %e,
                        "Worker socket error"
                    );
                    break;
                }
                // 二进制/心跳帧不属于协议，忽略
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    tracing::info!(connection_id = %connection_id, "Worker socket disconnected");
}
