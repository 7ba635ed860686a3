//! Fake Speech Engine - 用于测试的合成引擎
//!
//! 返回固定的目录与音频，记录所有调用，不触碰网络或文件系统。
//! 可注入 voice 加载失败与合成失败。

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::ports::{
    EngineError, SpeechEnginePort, SynthesisSink, VoiceSessionPort,
};
use crate::domain::{DownloadProgress, VoiceCatalogEntry};

/// Fake Speech Engine 配置
#[derive(Debug, Clone)]
pub struct FakeSpeechEngineConfig {
    /// 固定返回的音色目录
    pub catalog: Vec<VoiceCatalogEntry>,
    /// 固定返回的已存储 voice 标识符
    pub stored_voices: Vec<String>,
    /// 固定返回的音频数据
    pub audio: Vec<u8>,
    /// 注入的 voice 加载失败消息
    pub load_error: Option<String>,
    /// 注入的合成失败消息
    pub synthesis_error: Option<String>,
}

impl Default for FakeSpeechEngineConfig {
    fn default() -> Self {
        let entry = |key: &str| {
            let mut metadata = serde_json::Map::new();
            metadata.insert("name".to_string(), key.into());
            VoiceCatalogEntry {
                key: key.to_string(),
                metadata,
            }
        };
        Self {
            catalog: vec![entry("en_US-joe"), entry("en_GB-amy")],
            stored_voices: vec!["en_US-joe".to_string()],
            audio: b"RIFFfake-wav".to_vec(),
            load_error: None,
            synthesis_error: None,
        }
    }
}

/// 共享的调用记录
#[derive(Default)]
struct CallLog {
    loads: Mutex<Vec<String>>,
    synth_texts: Mutex<Vec<String>>,
    flushes: AtomicUsize,
}

/// Fake Speech Engine
pub struct FakeSpeechEngine {
    config: FakeSpeechEngineConfig,
    calls: Arc<CallLog>,
}

impl FakeSpeechEngine {
    pub fn new(config: FakeSpeechEngineConfig) -> Self {
        Self {
            config,
            calls: Arc::new(CallLog::default()),
        }
    }

    /// 按顺序记录的 voice 加载调用
    pub fn loaded_voices(&self) -> Vec<String> {
        self.calls.loads.lock().unwrap().clone()
    }

    /// 按顺序记录的合成文本
    pub fn synthesized_texts(&self) -> Vec<String> {
        self.calls.synth_texts.lock().unwrap().clone()
    }

    /// flush 调用次数
    pub fn flush_count(&self) -> usize {
        self.calls.flushes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SpeechEnginePort for FakeSpeechEngine {
    async fn voices(&self) -> Result<Vec<VoiceCatalogEntry>, EngineError> {
        Ok(self.config.catalog.clone())
    }

    async fn stored(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.config.stored_voices.clone())
    }

    async fn flush(&self) -> Result<(), EngineError> {
        self.calls.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn open_voice_session(&self, sink: Arc<dyn SynthesisSink>) -> Box<dyn VoiceSessionPort> {
        Box::new(FakeVoiceSession {
            config: self.config.clone(),
            calls: self.calls.clone(),
            sink,
        })
    }
}

/// Fake 会话句柄
struct FakeVoiceSession {
    config: FakeSpeechEngineConfig,
    calls: Arc<CallLog>,
    sink: Arc<dyn SynthesisSink>,
}

#[async_trait]
impl VoiceSessionPort for FakeVoiceSession {
    async fn load_voice(&mut self, voice_id: &str) -> Result<(), EngineError> {
        self.calls.loads.lock().unwrap().push(voice_id.to_string());

        if let Some(message) = &self.config.load_error {
            return Err(EngineError::VoiceLoad(message.clone()));
        }

        // 模拟分块下载进度 + 引擎日志
        let url = format!("http://fake/{voice_id}.onnx");
        let total = self.config.audio.len() as u64;
        for loaded in [total / 2, total] {
            self.sink.progress(DownloadProgress {
                url: url.clone(),
                loaded,
                total,
            });
        }
        self.sink.log(&format!("Loaded voice {voice_id}"));

        Ok(())
    }

    async fn synthesize(&mut self, text: &str) -> Result<Vec<u8>, EngineError> {
        self.calls.synth_texts.lock().unwrap().push(text.to_string());

        if let Some(message) = &self.config.synthesis_error {
            return Err(EngineError::Synthesis(message.clone()));
        }

        Ok(self.config.audio.clone())
    }
}
