use async_trait::async_trait;

use crate::domains::message::MessageEnvelope;
use crate::error::Result;
use crate::services::handler_node::HandlerContext;

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle_message(
        &self,
        envelope: &MessageEnvelope,
        ctx: &HandlerContext,
    ) -> Result<Option<MessageEnvelope>>;
}
