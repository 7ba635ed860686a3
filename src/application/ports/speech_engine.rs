//! Speech Engine Port - 语音合成引擎抽象
//!
//! 定义合成引擎的抽象接口，具体实现在 infrastructure/adapters 层。
//! 引擎是外部黑盒能力：音色目录、本地存储查询、缓存清空、
//! voice 模型加载与音频合成。

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{DownloadProgress, VoiceCatalogEntry};

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Voice load failed: {0}")]
    VoiceLoad(String),

    // 合成失败原样携带引擎消息，宿主收到的 error.message 即此文本
    #[error("{0}")]
    Synthesis(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 合成事件接收器
///
/// 在会话构造时注入的回调能力：引擎的进度/日志事件经由它
/// 流向出站通道，不反向持有调用方状态。
pub trait SynthesisSink: Send + Sync {
    /// voice 模型下载进度
    fn progress(&self, progress: DownloadProgress);

    /// 引擎日志行
    fn log(&self, message: &str);
}

/// Speech Engine Port
///
/// 外部语音合成能力的抽象接口。目录/存储/清空查询不依赖
/// 会话状态，可在 Uninitialized 阶段直接服务。
#[async_trait]
pub trait SpeechEnginePort: Send + Sync {
    /// 查询音色目录
    async fn voices(&self) -> Result<Vec<VoiceCatalogEntry>, EngineError>;

    /// 查询本地已存储的 voice 标识符
    async fn stored(&self) -> Result<Vec<String>, EngineError>;

    /// 清空本地 voice 缓存
    async fn flush(&self) -> Result<(), EngineError>;

    /// 打开 voice 会话句柄，绑定事件接收器
    ///
    /// 每个 worker 生命期内至多调用一次；句柄随 worker 终止被丢弃，
    /// 不存在显式销毁路径。
    fn open_voice_session(&self, sink: Arc<dyn SynthesisSink>) -> Box<dyn VoiceSessionPort>;
}

/// Voice Session Port
///
/// 有状态的会话句柄：先加载 voice 模型，再对文本合成。
#[async_trait]
pub trait VoiceSessionPort: Send {
    /// 加载指定 voice 模型（可能多次发出 progress/log 事件）
    async fn load_voice(&mut self, voice_id: &str) -> Result<(), EngineError>;

    /// 合成文本，返回编码后的音频
    async fn synthesize(&mut self, text: &str) -> Result<Vec<u8>, EngineError>;
}
