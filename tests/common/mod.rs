#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use atrium::config::{Config, MessageTypeConfig, Settings};
use atrium::domains::message::MessageEnvelope;
use atrium::error::{AtriumError, Result};
use atrium::interfaces::handler::MessageHandler;
use atrium::interfaces::transport::{EventStream, Transport};
use atrium::plugins::registry::{HandlerRegistry, HandlerSpec};
use atrium::services::handler_node::HandlerContext;
use atrium::services::transport::MemoryTransport;

pub const INGRESS: &str = "atriumd_ipc_rcv_channel";
pub const EGRESS: &str = "atriumd_ipc_send_channel";

/// In-memory transport that remembers every publish and subscribe.
#[derive(Default)]
pub struct RecordingTransport {
    pub inner: MemoryTransport,
    publishes: Mutex<Vec<(String, Vec<u8>)>>,
    subscriptions: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publishes(&self) -> Vec<(String, Vec<u8>)> {
        self.publishes.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.publishes.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<usize> {
        self.publishes
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_vec()));
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(&self, channel: &str) -> Result<EventStream> {
        self.subscriptions.lock().unwrap().push(channel.to_string());
        self.inner.subscribe(channel).await
    }
}

/// Shared log of (node id, envelope) pairs seen by `RecordingHandler`s.
pub type Seen = Arc<Mutex<Vec<(String, MessageEnvelope)>>>;

/// Records what it receives. Bodies of `"fail"` return an error and
/// `"panic"` panics, so tests can drive the failure paths.
pub struct RecordingHandler {
    seen: Seen,
}

impl RecordingHandler {
    pub fn new(seen: Seen) -> Self {
        Self { seen }
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle_message(
        &self,
        envelope: &MessageEnvelope,
        ctx: &HandlerContext,
    ) -> Result<Option<MessageEnvelope>> {
        match envelope.body.as_str() {
            Some("fail") => return Err(AtriumError::Runtime("requested failure".to_string())),
            Some("panic") => panic!("requested panic"),
            _ => {}
        }
        self.seen
            .lock()
            .unwrap()
            .push((ctx.node_id().to_string(), envelope.clone()));
        Ok(None)
    }
}

pub fn recording_registry(seen: &Seen) -> HandlerRegistry {
    let mut registry = HandlerRegistry::with_builtins();
    let seen = seen.clone();
    registry.register_factory("recording", move |_spec: &HandlerSpec| {
        Ok(Arc::new(RecordingHandler::new(seen.clone())) as Arc<dyn MessageHandler>)
    });
    registry
}

pub fn settings() -> Settings {
    let mut settings = Settings::new(INGRESS, EGRESS);
    settings.handler_poll_secs = 1;
    settings.receive_timeout_secs = 1;
    settings.virtual_nodes = 32;
    settings
}

pub fn topology(entries: &[(&str, &str, i64)]) -> Config {
    entries
        .iter()
        .fold(Config::new(settings()), |config, (name, class, size)| {
            config.with_message_type(name, MessageTypeConfig::new(*class, *size))
        })
}

pub fn envelope_bytes(message_type: &str, sender: Value, body: Value) -> Vec<u8> {
    serde_json::json!({
        "messageType": message_type,
        "bodyDataType": "application/json",
        "timestamp": "t0",
        "senderId": sender,
        "body": body,
    })
    .to_string()
    .into_bytes()
}

/// Wait up to two seconds for `count` handled messages.
pub async fn wait_for_seen(seen: &Seen, count: usize) -> bool {
    for _ in 0..200 {
        if seen_len(seen) >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait up to two seconds for `channel` to have exactly `count` subscribers.
pub async fn wait_for_subscribers(transport: &MemoryTransport, channel: &str, count: usize) -> bool {
    for _ in 0..200 {
        if transport.subscriber_count(channel).await == count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn seen_len(seen: &Seen) -> usize {
    seen.lock().unwrap().len()
}
