use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::domains::message::{self, MessageEnvelope};
use crate::error::{AtriumError, Result};
use crate::interfaces::transport::Transport;
use crate::services::transport::RedisTransport;

pub const JSON_MIMETYPE: &str = "application/json";

pub struct AtriumClient {
    transport: Arc<dyn Transport>,
    channel: String,
}

impl AtriumClient {
    pub fn new(transport: Arc<dyn Transport>, channel: impl Into<String>) -> Self {
        Self {
            transport,
            channel: channel.into(),
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = RedisTransport::connect(&config.settings.redis_url()).await?;
        Ok(Self::new(
            Arc::new(transport),
            config.settings.ingress_channel.clone(),
        ))
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub async fn send(&self, message_type: &str, body: Value) -> Result<bool> {
        Ok(self.publish(message_type, body).await? > 0)
    }

    pub async fn publish(&self, message_type: &str, body: Value) -> Result<usize> {
        let envelope =
            MessageEnvelope::new(message_type, JSON_MIMETYPE, std::process::id(), body);
        self.send_envelope(&envelope).await
    }

    pub async fn send_envelope(&self, envelope: &MessageEnvelope) -> Result<usize> {
        self.publish_raw(&message::encode(envelope)).await
    }

    pub async fn publish_raw(&self, payload: &[u8]) -> Result<usize> {
        self.transport.publish(&self.channel, payload).await
    }
}

pub fn parse_message_data<S: AsRef<str>>(pairs: &[S]) -> Result<Value> {
    let mut body = serde_json::Map::new();
    for pair in pairs {
        let pair = pair.as_ref().trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once(':').ok_or_else(|| {
            AtriumError::Config(format!(
                "message data must be in the format <name:value>, got `{pair}`"
            ))
        })?;
        body.insert(name.trim().to_string(), Value::String(value.to_string()));
    }
    Ok(Value::Object(body))
}
