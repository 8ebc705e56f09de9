use async_trait::async_trait;
use tracing::info;

use crate::domains::message::MessageEnvelope;
use crate::error::Result;
use crate::interfaces::handler::MessageHandler;
use crate::services::handler_node::HandlerContext;

pub const NAME: &str = "console";

pub struct ConsoleHandler;

#[async_trait]
impl MessageHandler for ConsoleHandler {
    fn name(&self) -> &str {
        NAME
    }

    async fn handle_message(
        &self,
        envelope: &MessageEnvelope,
        ctx: &HandlerContext,
    ) -> Result<Option<MessageEnvelope>> {
        info!(
            node_id = ctx.node_id(),
            message_type = %envelope.message_type,
            sender = %envelope.sender_id,
            body = %envelope.body,
            "message received"
        );
        Ok(None)
    }
}
