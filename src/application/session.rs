//! Session Controller - 语音会话控制器
//!
//! 每个 worker 持有至多一个会话：首个 init 请求惰性构造引擎句柄，
//! 之后按请求对齐 voice 并串行执行合成。状态机显式表达为
//! `Uninitialized | Ready { voice_id, handle }`。

use std::sync::Arc;

use crate::application::ports::{
    EngineError, SpeechEnginePort, SynthesisSink, VoiceSessionPort,
};

/// 会话状态
///
/// Ready 的 voice_id 在加载 *开始前* 更新：加载失败时该字段
/// 指向正在切换的目标 voice，而非此前可用的 voice。
enum SessionState {
    Uninitialized,
    Ready {
        voice_id: String,
        handle: Box<dyn VoiceSessionPort>,
    },
}

/// 语音会话控制器
pub struct SessionController {
    engine: Arc<dyn SpeechEnginePort>,
    sink: Arc<dyn SynthesisSink>,
    state: SessionState,
}

impl SessionController {
    pub fn new(engine: Arc<dyn SpeechEnginePort>, sink: Arc<dyn SynthesisSink>) -> Self {
        Self {
            engine,
            sink,
            state: SessionState::Uninitialized,
        }
    }

    /// 当前 voice 标识符；尚未初始化时为 None
    pub fn current_voice(&self) -> Option<&str> {
        match &self.state {
            SessionState::Uninitialized => None,
            SessionState::Ready { voice_id, .. } => Some(voice_id),
        }
    }

    /// 执行一次 init 请求：对齐 voice 后合成文本
    ///
    /// 首次调用构造引擎句柄，voice_id 置空，因此首个请求必然
    /// 触发一次 voice 加载。同 voice 的后续请求跳过加载直达合成。
    /// 加载失败与合成失败都以 Err 返回；句柄与 voice_id 不回滚，
    /// 后续请求可重试或切换 voice。
    pub async fn speak(&mut self, voice_id: &str, text: &str) -> Result<Vec<u8>, EngineError> {
        let (current, handle) = self.ensure_session();

        if current.as_str() != voice_id {
            // 加载前先更新，见 SessionState 注释
            *current = voice_id.to_string();
            tracing::debug!(voice_id = %voice_id, "Loading voice");
            handle.load_voice(voice_id).await?;
        }

        handle.synthesize(text).await
    }

    /// 惰性构造会话，返回状态内的可变引用
    fn ensure_session(&mut self) -> (&mut String, &mut Box<dyn VoiceSessionPort>) {
        if matches!(self.state, SessionState::Uninitialized) {
            let handle = self.engine.open_voice_session(self.sink.clone());
            self.state = SessionState::Ready {
                voice_id: String::new(),
                handle,
            };
            tracing::debug!("Voice session created");
        }

        match &mut self.state {
            SessionState::Ready { voice_id, handle } => (voice_id, handle),
            SessionState::Uninitialized => unreachable!("session created above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DownloadProgress;
    use crate::infrastructure::adapters::{FakeSpeechEngine, FakeSpeechEngineConfig};
    use std::sync::Mutex;

    /// 记录型 sink，校验进度/日志事件
    #[derive(Default)]
    struct RecordingSink {
        progress: Mutex<Vec<DownloadProgress>>,
        logs: Mutex<Vec<String>>,
    }

    impl SynthesisSink for RecordingSink {
        fn progress(&self, progress: DownloadProgress) {
            self.progress.lock().unwrap().push(progress);
        }

        fn log(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_string());
        }
    }

    fn controller_with(
        config: FakeSpeechEngineConfig,
    ) -> (SessionController, Arc<FakeSpeechEngine>, Arc<RecordingSink>) {
        let engine = Arc::new(FakeSpeechEngine::new(config));
        let sink = Arc::new(RecordingSink::default());
        let controller = SessionController::new(engine.clone(), sink.clone());
        (controller, engine, sink)
    }

    #[tokio::test]
    async fn test_first_request_loads_voice_then_synthesizes() {
        let (mut controller, engine, _sink) =
            controller_with(FakeSpeechEngineConfig::default());

        assert_eq!(controller.current_voice(), None);

        let audio = controller.speak("en_US-joe", "hello").await.unwrap();
        assert!(!audio.is_empty());
        assert_eq!(engine.loaded_voices(), vec!["en_US-joe"]);
        assert_eq!(engine.synthesized_texts(), vec!["hello"]);
        assert_eq!(controller.current_voice(), Some("en_US-joe"));
    }

    #[tokio::test]
    async fn test_same_voice_loads_at_most_once() {
        let (mut controller, engine, _sink) =
            controller_with(FakeSpeechEngineConfig::default());

        controller.speak("en_US-joe", "one").await.unwrap();
        controller.speak("en_US-joe", "two").await.unwrap();
        controller.speak("en_US-joe", "three").await.unwrap();

        assert_eq!(engine.loaded_voices(), vec!["en_US-joe"]);
        assert_eq!(engine.synthesized_texts(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_voice_switch_reloads() {
        let (mut controller, engine, _sink) =
            controller_with(FakeSpeechEngineConfig::default());

        controller.speak("en_US-joe", "").await.unwrap();
        controller.speak("en_GB-amy", "hi").await.unwrap();

        assert_eq!(engine.loaded_voices(), vec!["en_US-joe", "en_GB-amy"]);
        assert_eq!(controller.current_voice(), Some("en_GB-amy"));
    }

    #[tokio::test]
    async fn test_empty_text_passed_through_verbatim() {
        let (mut controller, engine, _sink) =
            controller_with(FakeSpeechEngineConfig::default());

        controller.speak("en_US-joe", "").await.unwrap();
        assert_eq!(engine.synthesized_texts(), vec![""]);
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_session_ready() {
        let config = FakeSpeechEngineConfig {
            synthesis_error: Some("boom".to_string()),
            ..Default::default()
        };
        let (mut controller, engine, _sink) = controller_with(config);

        let err = controller.speak("en_US-joe", "hello").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");

        // 状态不回滚：同 voice 重试不再加载
        assert_eq!(controller.current_voice(), Some("en_US-joe"));
        let err = controller.speak("en_US-joe", "again").await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(engine.loaded_voices(), vec!["en_US-joe"]);
    }

    #[tokio::test]
    async fn test_load_failure_leaves_target_voice_id() {
        let config = FakeSpeechEngineConfig {
            load_error: Some("missing model".to_string()),
            ..Default::default()
        };
        let (mut controller, engine, _sink) = controller_with(config);

        let err = controller.speak("en_US-joe", "hello").await.unwrap_err();
        assert!(err.to_string().contains("missing model"));

        // voice_id 在加载前更新，失败后指向目标 voice
        assert_eq!(controller.current_voice(), Some("en_US-joe"));
        // 合成未被调用
        assert!(engine.synthesized_texts().is_empty());
    }

    #[tokio::test]
    async fn test_load_emits_progress_and_log_through_sink() {
        let (mut controller, _engine, sink) =
            controller_with(FakeSpeechEngineConfig::default());

        controller.speak("en_US-joe", "hello").await.unwrap();

        let progress = sink.progress.lock().unwrap();
        assert!(!progress.is_empty());
        assert!(progress.iter().all(|p| p.url.contains("en_US-joe")));

        let logs = sink.logs.lock().unwrap();
        assert!(logs.iter().any(|l| l.contains("en_US-joe")));
    }
}
