//! Vocel - 语音合成 Worker 服务
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Message Protocol: worker 边界的入站/出站消息协议
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechEngine, VoiceSession, SynthesisSink）
//! - Session: 语音会话控制器（状态机）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: WebSocket 宿主桥接 + 健康检查
//! - Worker: SpeechWorker 消息路由
//! - Adapters: Piper Engine, Fake Engine
//! - Events: 出站消息发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
