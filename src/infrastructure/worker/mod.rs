//! Worker Layer - Speech Worker 消息路由
//!
//! 实现 SpeechWorker：worker 边界的唯一入口，串行处理入站消息

mod speech_worker;

pub use speech_worker::{SpeechWorker, SpeechWorkerConfig, SpeechWorkerHandle};
