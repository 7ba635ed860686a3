//! Application State

use std::sync::Arc;

use crate::application::ports::SpeechEnginePort;

/// 应用状态
///
/// 引擎实例进程内唯一；每个 WebSocket 连接基于它派生
/// 一个独立的 SpeechWorker（各自持有独立会话）。
pub struct AppState {
    pub engine: Arc<dyn SpeechEnginePort>,
}

impl AppState {
    pub fn new(engine: Arc<dyn SpeechEnginePort>) -> Self {
        Self { engine }
    }
}
