//! Events Layer - 出站消息发布

mod publisher;

pub use publisher::OutboundPublisher;
