//! Worker Message Protocol - worker 边界消息协议
//!
//! 宿主与 worker 之间的 JSON 消息，形如 `{ "type": ..., ... }`。
//! 入站消息每条恰好一个变体，由 `type` 决定分发；
//! 一条入站消息可触发零条或多条出站消息。

use serde::{Deserialize, Serialize};

/// Voice 模型下载进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// 正在下载的资源 URL
    pub url: String,
    /// 已下载字节数
    pub loaded: u64,
    /// 总字节数（未知时为 0）
    pub total: u64,
}

/// 音色目录条目
///
/// 由引擎的目录查询返回，core 不拥有其结构，原样转发。
/// `key` 为 voice 标识符，其余元数据展平保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCatalogEntry {
    pub key: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// 入站消息 (host -> worker)
///
/// 不匹配任何变体的消息（未知 type、init 缺少 voiceId 等）
/// 在解析阶段失败，由路由器静默丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// 初始化并合成：切换/加载 voice 后合成 text
    Init {
        #[serde(rename = "voiceId")]
        voice_id: String,
        /// 缺省时按空字符串处理，原样传给引擎
        #[serde(default)]
        text: String,
    },
    /// 查询音色目录
    Voices,
    /// 查询本地已存储的 voice
    Stored,
    /// 清空本地 voice 缓存（无任何回应）
    Flush,
}

/// 出站消息 (worker -> host)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// 音色目录
    Voices { voices: Vec<VoiceCatalogEntry> },
    /// 本地已存储的 voice 标识符
    Stored {
        #[serde(rename = "voiceIds")]
        voice_ids: Vec<String>,
    },
    /// 下载进度（init 流程中可出现多条）
    Progress { progress: DownloadProgress },
    /// 引擎日志转发
    Log { message: String },
    /// 合成结果（终态，JSON 线上为 base64）
    Result {
        #[serde(with = "audio_base64")]
        audio: Vec<u8>,
    },
    /// 失败（终态）
    Error { message: String },
}

/// 音频二进制在 JSON 线上的 base64 编解码
mod audio_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(audio: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(audio))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"init","voiceId":"en_US-joe","text":"hello"}"#)
                .unwrap();
        assert_eq!(
            msg,
            InboundMessage::Init {
                voice_id: "en_US-joe".to_string(),
                text: "hello".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_init_missing_text_defaults_to_empty() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type":"init","voiceId":"en_US-joe"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Init {
                voice_id: "en_US-joe".to_string(),
                text: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_init_missing_voice_id_fails() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"type":"init","text":"hello"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"ping"}"#).is_err());
        assert!(serde_json::from_str::<InboundMessage>(r#"{"kind":"voices"}"#).is_err());
        assert!(serde_json::from_str::<InboundMessage>("not json").is_err());
    }

    #[test]
    fn test_parse_parameterless_variants() {
        for (raw, expected) in [
            (r#"{"type":"voices"}"#, InboundMessage::Voices),
            (r#"{"type":"stored"}"#, InboundMessage::Stored),
            (r#"{"type":"flush"}"#, InboundMessage::Flush),
        ] {
            let msg: InboundMessage = serde_json::from_str(raw).unwrap();
            assert_eq!(msg, expected);
        }
    }

    #[test]
    fn test_serialize_stored_uses_camel_case() {
        let msg = OutboundMessage::Stored {
            voice_ids: vec!["en_US-joe".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"stored","voiceIds":["en_US-joe"]}"#);
    }

    #[test]
    fn test_serialize_result_encodes_audio_as_base64() {
        let msg = OutboundMessage::Result {
            audio: vec![1, 2, 3, 4],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"result","audio":"AQIDBA=="}"#);

        let parsed: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_catalog_entry_relays_opaque_metadata() {
        let raw = r#"{"key":"en_US-joe","name":"Joe","language":{"code":"en_US"}}"#;
        let entry: VoiceCatalogEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.key, "en_US-joe");
        assert_eq!(entry.metadata["name"], "Joe");

        // 元数据往返无损
        let json = serde_json::to_string(&entry).unwrap();
        let reparsed: VoiceCatalogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed, entry);
    }
}
