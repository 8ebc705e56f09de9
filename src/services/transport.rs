use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::error::{AtriumError, Result};
use crate::interfaces::transport::{EventStream, Transport, TransportEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct RedisTransport {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| AtriumError::Transport(e.to_string()))?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AtriumError::Transport(e.to_string()))?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize> {
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| AtriumError::Transport(e.to_string()))?;
        Ok(receivers.max(0) as usize)
    }

    async fn subscribe(&self, channel: &str) -> Result<EventStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| AtriumError::Transport(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| AtriumError::Transport(e.to_string()))?;

        let name = channel.to_string();
        let stream = async_stream::stream! {
            yield TransportEvent::SubscribeAck { channel: name.clone() };
            let messages = pubsub.into_on_message();
            futures::pin_mut!(messages);
            while let Some(msg) = messages.next().await {
                yield TransportEvent::Message {
                    channel: msg.get_channel_name().to_string(),
                    payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
                };
            }
            debug!(channel = %name, "redis subscription closed");
        };
        Ok(Box::pin(stream))
    }
}

pub struct MemoryTransport {
    channels: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,
    capacity: usize,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub async fn disconnect(&self, channel: &str) -> bool {
        self.channels.write().await.remove(channel).is_some()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize> {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(channel) else {
            return Ok(0);
        };
        Ok(sender.send(Bytes::copy_from_slice(payload)).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> Result<EventStream> {
        let mut receiver = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let name = channel.to_string();
        let stream = async_stream::stream! {
            yield TransportEvent::SubscribeAck { channel: name.clone() };
            loop {
                match receiver.recv().await {
                    Ok(payload) => yield TransportEvent::Message { channel: name.clone(), payload },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %name, skipped, "subscriber lagged; messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_transport_acks_then_delivers() {
        let transport = MemoryTransport::new();
        assert_eq!(transport.publish("a", b"lost").await.unwrap(), 0);

        let mut first = transport.subscribe("a").await.unwrap();
        let mut second = transport.subscribe("a").await.unwrap();
        assert_eq!(transport.subscriber_count("a").await, 2);
        assert_eq!(transport.publish("a", b"hello").await.unwrap(), 2);
        assert_eq!(transport.publish("b", b"elsewhere").await.unwrap(), 0);

        for stream in [&mut first, &mut second] {
            assert_eq!(
                stream.next().await,
                Some(TransportEvent::SubscribeAck { channel: "a".to_string() })
            );
            let event = stream.next().await.unwrap();
            assert_eq!(event.payload().unwrap().as_ref(), b"hello");
            assert_eq!(event.channel(), "a");
        }
    }

    #[tokio::test]
    async fn disconnect_ends_streams() {
        let transport = MemoryTransport::new();
        let mut stream = transport.subscribe("a").await.unwrap();
        assert!(transport.disconnect("a").await);
        assert!(matches!(stream.next().await, Some(TransportEvent::SubscribeAck { .. })));
        assert!(stream.next().await.is_none());
        assert!(!transport.disconnect("a").await);
    }
}
