use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domains::message::MessageEnvelope;
use crate::error::{AtriumError, Result};
use crate::interfaces::handler::MessageHandler;
use crate::plugins::registry::HandlerSpec;
use crate::services::handler_node::HandlerContext;

pub const NAME: &str = "ping";
pub const RESPONSE_TYPE: &str = "pong";

pub struct PingHandler {
    message: String,
}

impl PingHandler {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_spec(spec: &HandlerSpec) -> Result<Self> {
        let message = match spec.config.get("message") {
            None | Some(Value::Null) => format!("The {} handler is alive.", spec.message_type),
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                return Err(AtriumError::Config(format!(
                    "ping message must be a string, got {other}"
                )))
            }
        };
        Ok(Self::new(message))
    }
}

#[async_trait]
impl MessageHandler for PingHandler {
    fn name(&self) -> &str {
        NAME
    }

    async fn handle_message(
        &self,
        _envelope: &MessageEnvelope,
        ctx: &HandlerContext,
    ) -> Result<Option<MessageEnvelope>> {
        Ok(Some(MessageEnvelope::new(
            RESPONSE_TYPE,
            "application/json",
            ctx.node_id(),
            json!({"status": "ok", "message": self.message}),
        )))
    }
}
