use async_trait::async_trait;

use crate::domains::message::MessageEnvelope;
use crate::error::Result;
use crate::interfaces::handler::MessageHandler;
use crate::services::handler_node::HandlerContext;

pub const NAME: &str = "echo";

pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    fn name(&self) -> &str {
        NAME
    }

    async fn handle_message(
        &self,
        envelope: &MessageEnvelope,
        ctx: &HandlerContext,
    ) -> Result<Option<MessageEnvelope>> {
        Ok(Some(MessageEnvelope::new(
            format!("{}.echo", envelope.message_type),
            envelope.body_data_type.clone(),
            ctx.node_id(),
            envelope.body.clone(),
        )))
    }
}
