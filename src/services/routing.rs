use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domains::message::{self, MessageEnvelope};
use crate::error::{AtriumError, Result};
use crate::interfaces::transport::{Transport, TransportEvent};
use crate::services::handler_node::HandlerNode;
use crate::services::ring::HashRing;

pub type DispatchTarget = HashRing<HandlerNode>;

#[derive(Debug, Clone, PartialEq)]
pub enum Forwarded {
    Ignored,
    Delivered {
        message_type: String,
        node_id: String,
        channel: String,
        subscribers: usize,
    },
}

pub struct Switch {
    transport: Arc<dyn Transport>,
    handler_classes: HashMap<String, String>,
    dispatch_table: HashMap<String, DispatchTarget>,
    workers: Vec<JoinHandle<()>>,
}

impl Switch {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        handler_classes: HashMap<String, String>,
        dispatch_table: HashMap<String, DispatchTarget>,
        workers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            transport,
            handler_classes,
            dispatch_table,
            workers,
        }
    }

    pub async fn forward(&self, event: &TransportEvent) -> Result<Forwarded> {
        let payload = match event {
            TransportEvent::SubscribeAck { channel } => {
                debug!(%channel, "ignoring subscription ack");
                return Ok(Forwarded::Ignored);
            }
            TransportEvent::Message { payload, .. } => payload,
        };

        let envelope = message::decode(payload)
            .map_err(|e| AtriumError::BadMessageHeaderFormat(e.to_string()))?;
        let target = self
            .dispatch_table
            .get(&envelope.message_type)
            .ok_or_else(|| AtriumError::UnregisteredMessageType(envelope.message_type.clone()))?;

        let key = affinity_key(&envelope, payload);
        let node = target.get_node(&key).ok_or(AtriumError::EmptyRing)?;
        let subscribers = self
            .transport
            .publish(node.receive_channel(), payload)
            .await?;
        if subscribers == 0 {
            warn!(
                message_type = %envelope.message_type,
                node_id = node.id(),
                "no live subscriber on node channel; message lost"
            );
        } else {
            debug!(
                message_type = %envelope.message_type,
                node_id = node.id(),
                "message forwarded"
            );
        }

        Ok(Forwarded::Delivered {
            message_type: envelope.message_type,
            node_id: node.id().to_string(),
            channel: node.receive_channel().to_string(),
            subscribers,
        })
    }

    pub fn target(&self, message_type: &str) -> Option<&DispatchTarget> {
        self.dispatch_table.get(message_type)
    }

    pub fn handler_class(&self, message_type: &str) -> Option<&str> {
        self.handler_classes.get(message_type).map(String::as_str)
    }

    pub fn message_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.dispatch_table.keys().map(String::as_str).collect();
        types.sort();
        types
    }

    pub fn node_count(&self) -> usize {
        self.dispatch_table.values().map(|target| target.len()).sum()
    }

    pub fn shutdown(self) {
        info!(nodes = self.node_count(), "switch shutting down");
    }
}

impl Drop for Switch {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// The value hashed onto a type's ring.
///
/// Messages from the same sender always land on the same node. Sender-less
/// messages fall back to a digest of their own bytes, so identical payloads
/// still agree on a node.
pub fn affinity_key(envelope: &MessageEnvelope, payload: &[u8]) -> Vec<u8> {
    match &envelope.sender_id {
        Value::Null => Sha256::digest(payload).to_vec(),
        Value::String(sender) => sender.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    }
}
