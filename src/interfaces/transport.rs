use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    SubscribeAck { channel: String },
    Message { channel: String, payload: Bytes },
}

impl TransportEvent {
    pub fn channel(&self) -> &str {
        match self {
            Self::SubscribeAck { channel } | Self::Message { channel, .. } => channel,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Message { payload, .. } => Some(payload),
            Self::SubscribeAck { .. } => None,
        }
    }
}

pub type EventStream = BoxStream<'static, TransportEvent>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize>;

    /// The returned stream yields a `SubscribeAck` before any message and
    /// ends when the underlying connection goes away.
    async fn subscribe(&self, channel: &str) -> Result<EventStream>;
}
