use std::collections::HashMap;
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{Config, MessageTypeConfig, Settings};
use crate::error::{AtriumError, Result};
use crate::interfaces::transport::Transport;
use crate::plugins::registry::{HandlerRegistry, HandlerSpec};
use crate::services::handler_node::{HandlerNode, NodeOptions};
use crate::services::ring::HashRing;
use crate::services::routing::{DispatchTarget, Switch};

/// Turns a topology into a running `Switch`.
///
/// Building is all-or-nothing: if any type fails, every node started so far
/// is stopped and no switch is returned.
pub struct SwitchBuilder {
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
}

impl SwitchBuilder {
    pub fn new(transport: Arc<dyn Transport>, registry: HandlerRegistry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn build(&self, config: &Config) -> Result<Switch> {
        config.validate()?;
        let options = config.settings.node_options();
        let mut workers = Vec::new();
        let mut handler_classes = HashMap::new();
        let mut dispatch_table = HashMap::new();

        for (message_type, entry) in &config.message_types {
            let built = self
                .build_target(message_type, entry, &config.settings, &options, &mut workers)
                .await;
            match built {
                Ok(target) => {
                    handler_classes.insert(message_type.clone(), entry.handler_class.clone());
                    dispatch_table.insert(message_type.clone(), target);
                }
                Err(err) => {
                    error!(%message_type, error = %err, "switch build failed");
                    for worker in &workers {
                        worker.abort();
                    }
                    return Err(err);
                }
            }
        }

        info!(
            message_types = dispatch_table.len(),
            nodes = workers.len(),
            ingress = %config.settings.ingress_channel,
            "switch built"
        );
        Ok(Switch::new(
            self.transport.clone(),
            handler_classes,
            dispatch_table,
            workers,
        ))
    }

    async fn build_target(
        &self,
        message_type: &str,
        entry: &MessageTypeConfig,
        settings: &Settings,
        options: &NodeOptions,
        workers: &mut Vec<JoinHandle<()>>,
    ) -> Result<DispatchTarget> {
        if entry.handler_pool_size < 1 {
            return Err(AtriumError::HandlerConstruction(format!(
                "pool size for `{message_type}` must be positive, got {}",
                entry.handler_pool_size
            )));
        }
        if !self.registry.contains(&entry.handler_class) {
            return Err(AtriumError::HandlerConstruction(format!(
                "unknown handler class `{}` for `{message_type}`",
                entry.handler_class
            )));
        }

        let pool_size = entry.handler_pool_size as usize;
        let mut nodes = Vec::with_capacity(pool_size);
        for index in 0..pool_size {
            let node_id = format!("{message_type}-{index}");
            let spec = HandlerSpec {
                message_type: message_type.to_string(),
                node_id: node_id.clone(),
                index,
                config: entry.handler_config.clone().unwrap_or_default(),
            };
            let handler = self.registry.create(&entry.handler_class, &spec)?;
            let node = Arc::new(HandlerNode::new(
                node_id,
                message_type,
                receive_channel_name(&settings.ingress_channel, message_type, index),
                settings.egress_channel.as_str(),
                handler,
            ));
            let worker = node
                .start(self.transport.clone(), options.clone())
                .await
                .map_err(|e| {
                    AtriumError::HandlerConstruction(format!(
                        "node `{}` failed to start: {e}",
                        node.id()
                    ))
                })?;
            workers.push(worker);
            nodes.push(node);
        }

        HashRing::build(nodes, settings.virtual_nodes)
    }
}

pub fn receive_channel_name(ingress: &str, message_type: &str, index: usize) -> String {
    format!(
        "{ingress}.{message_type}.{index}.{:016x}",
        OsRng.next_u64()
    )
}
