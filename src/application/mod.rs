//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechEngine、VoiceSession、SynthesisSink）
//! - session: 语音会话控制器（Uninitialized/Ready 状态机）

pub mod ports;
pub mod session;

pub use ports::{
    EngineError, SpeechEnginePort, SynthesisSink, VoiceSessionPort,
};
pub use session::SessionController;
