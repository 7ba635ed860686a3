//! Outbound Publisher Implementation
//!
//! worker -> host 出站消息通道。同时实现 SynthesisSink：
//! 引擎在 await 期间发出的进度/日志回调经由同一通道发布，
//! 与同请求的终态消息保持相对顺序。

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::ports::SynthesisSink;
use crate::domain::{DownloadProgress, OutboundMessage, VoiceCatalogEntry};

/// 出站消息发布器
pub struct OutboundPublisher {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl OutboundPublisher {
    /// 创建发布器与宿主侧接收端
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    /// 发布一条出站消息
    ///
    /// 宿主侧已断开时丢弃消息，仅记录日志。
    pub fn publish(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Host channel closed, dropping outbound message");
        }
    }

    /// 发布音色目录
    pub fn publish_voices(&self, voices: Vec<VoiceCatalogEntry>) {
        self.publish(OutboundMessage::Voices { voices });
    }

    /// 发布本地已存储的 voice 标识符
    pub fn publish_stored(&self, voice_ids: Vec<String>) {
        self.publish(OutboundMessage::Stored { voice_ids });
    }

    /// 发布合成结果（终态）
    pub fn publish_result(&self, audio: Vec<u8>) {
        self.publish(OutboundMessage::Result { audio });
    }

    /// 发布失败（终态）
    pub fn publish_error(&self, message: &str) {
        self.publish(OutboundMessage::Error {
            message: message.to_string(),
        });
    }
}

impl SynthesisSink for OutboundPublisher {
    fn progress(&self, progress: DownloadProgress) {
        self.publish(OutboundMessage::Progress { progress });
    }

    fn log(&self, message: &str) {
        self.publish(OutboundMessage::Log {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_events_share_channel_order() {
        let (publisher, mut rx) = OutboundPublisher::channel();

        publisher.progress(DownloadProgress {
            url: "http://example/voice.onnx".to_string(),
            loaded: 10,
            total: 100,
        });
        publisher.log("loading");
        publisher.publish_result(vec![1, 2, 3]);

        assert!(matches!(
            rx.recv().await.unwrap(),
            OutboundMessage::Progress { .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), OutboundMessage::Log { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            OutboundMessage::Result { .. }
        ));
    }

    #[test]
    fn test_publish_after_host_disconnect_is_silent() {
        let (publisher, rx) = OutboundPublisher::channel();
        drop(rx);
        // 不 panic，消息被丢弃
        publisher.publish_error("late");
    }
}
