//! Engine Adapter - 语音合成引擎实现

mod fake_engine;
mod piper_engine;

pub use fake_engine::{FakeSpeechEngine, FakeSpeechEngineConfig};
pub use piper_engine::{PiperEngine, PiperEngineConfig};
