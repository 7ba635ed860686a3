//! Domain Layer - 领域层
//!
//! Worker 边界消息协议：入站/出站消息的 tagged union 定义

mod message;

pub use message::{DownloadProgress, InboundMessage, OutboundMessage, VoiceCatalogEntry};
