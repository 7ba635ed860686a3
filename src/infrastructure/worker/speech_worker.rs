//! Speech Worker - Worker Message Router
//!
//! worker 边界的唯一入口：从入站队列逐条消费宿主消息，
//! 分发到会话控制器或直接引擎查询，并独占出站消息发布。
//! 同一 worker 内单 handler 串行执行，消息 N 的出站结果先于
//! 消息 N+1 的处理（单消费者队列语义）。

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::ports::SpeechEnginePort;
use crate::application::session::SessionController;
use crate::domain::{InboundMessage, OutboundMessage};
use crate::infrastructure::events::OutboundPublisher;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct SpeechWorkerConfig {
    /// 入站队列容量
    pub queue_capacity: usize,
}

impl Default for SpeechWorkerConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// 宿主侧句柄：入站发送端 + 出站接收端
///
/// 入站端被丢弃后 worker 退出，随之关闭出站通道。
pub struct SpeechWorkerHandle {
    pub inbound: mpsc::Sender<String>,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// Speech Worker
///
/// 每个 worker 实例拥有独立的会话；宿主可并行运行多个实例。
pub struct SpeechWorker {
    id: Uuid,
    inbound: mpsc::Receiver<String>,
    publisher: Arc<OutboundPublisher>,
    engine: Arc<dyn SpeechEnginePort>,
    controller: SessionController,
}

impl SpeechWorker {
    /// 创建 worker 与宿主侧句柄
    pub fn new(
        engine: Arc<dyn SpeechEnginePort>,
        config: SpeechWorkerConfig,
    ) -> (Self, SpeechWorkerHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
        let (publisher, outbound_rx) = OutboundPublisher::channel();

        let worker = Self {
            id: Uuid::new_v4(),
            inbound: inbound_rx,
            controller: SessionController::new(engine.clone(), publisher.clone()),
            publisher,
            engine,
        };

        let handle = SpeechWorkerHandle {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };

        (worker, handle)
    }

    /// 创建并在后台任务中启动 worker
    pub fn spawn(
        engine: Arc<dyn SpeechEnginePort>,
        config: SpeechWorkerConfig,
    ) -> SpeechWorkerHandle {
        let (worker, handle) = Self::new(engine, config);
        tokio::spawn(worker.run());
        handle
    }

    /// 运行消息循环，直至入站通道关闭
    pub async fn run(mut self) {
        tracing::info!(worker_id = %self.id, "SpeechWorker started");

        while let Some(raw) = self.inbound.recv().await {
            self.dispatch(&raw).await;
        }

        tracing::info!(worker_id = %self.id, "SpeechWorker stopped");
    }

    /// 处理单条入站消息
    ///
    /// 不匹配协议的消息静默丢弃：不回应，不报错。
    async fn dispatch(&mut self, raw: &str) {
        let message = match serde_json::from_str::<InboundMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    worker_id = %self.id,
                    error = %e,
                    "Ignoring unrecognized inbound message"
                );
                return;
            }
        };

        match message {
            InboundMessage::Voices => match self.engine.voices().await {
                Ok(voices) => self.publisher.publish_voices(voices),
                // 查询失败对宿主静默，仅服务端留痕
                Err(e) => {
                    tracing::warn!(worker_id = %self.id, error = %e, "Voice catalog query failed")
                }
            },
            InboundMessage::Stored => match self.engine.stored().await {
                Ok(voice_ids) => self.publisher.publish_stored(voice_ids),
                Err(e) => {
                    tracing::warn!(worker_id = %self.id, error = %e, "Stored voices query failed")
                }
            },
            InboundMessage::Flush => {
                // fire-and-forget：成功与否都不回应
                if let Err(e) = self.engine.flush().await {
                    tracing::warn!(worker_id = %self.id, error = %e, "Voice cache flush failed");
                }
            }
            InboundMessage::Init { voice_id, text } => {
                match self.controller.speak(&voice_id, &text).await {
                    Ok(audio) => self.publisher.publish_result(audio),
                    Err(e) => {
                        tracing::warn!(
                            worker_id = %self.id,
                            voice_id = %voice_id,
                            error = %e,
                            "Synthesis request failed"
                        );
                        self.publisher.publish_error(&e.to_string());
                    }
                }
            }
        }
    }
}
