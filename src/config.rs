use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{AtriumError, Result};
use crate::services::handler_node::{NodeOptions, RestartPolicy};
use crate::services::ring::DEFAULT_VIRTUAL_NODES;

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_receive_timeout_secs() -> u64 {
    60
}

fn default_handler_poll_secs() -> u64 {
    5
}

fn default_virtual_nodes() -> usize {
    DEFAULT_VIRTUAL_NODES
}

fn default_max_restarts() -> u32 {
    3
}

fn default_restart_window_secs() -> u64 {
    60
}

fn default_pool_size() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_host")]
    pub transport_host: String,
    #[serde(default = "default_port")]
    pub transport_port: u16,
    #[serde(default)]
    pub transport_db: i64,
    pub ingress_channel: String,
    pub egress_channel: String,
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,
    #[serde(default = "default_handler_poll_secs")]
    pub handler_poll_secs: u64,
    #[serde(default = "default_virtual_nodes")]
    pub virtual_nodes: usize,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_window_secs")]
    pub restart_window_secs: u64,
}

impl Settings {
    pub fn new(ingress_channel: impl Into<String>, egress_channel: impl Into<String>) -> Self {
        Self {
            transport_host: default_host(),
            transport_port: default_port(),
            transport_db: 0,
            ingress_channel: ingress_channel.into(),
            egress_channel: egress_channel.into(),
            receive_timeout_secs: default_receive_timeout_secs(),
            handler_poll_secs: default_handler_poll_secs(),
            virtual_nodes: default_virtual_nodes(),
            max_restarts: default_max_restarts(),
            restart_window_secs: default_restart_window_secs(),
        }
    }

    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.transport_host, self.transport_port, self.transport_db
        )
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs.max(1))
    }

    pub fn node_options(&self) -> NodeOptions {
        let defaults = RestartPolicy::default();
        NodeOptions {
            poll_timeout: Duration::from_secs(self.handler_poll_secs.max(1)),
            restart: RestartPolicy::new(
                self.max_restarts,
                Duration::from_secs(self.restart_window_secs.max(1)),
                defaults.backoff,
                defaults.max_backoff,
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTypeConfig {
    pub handler_class: String,
    /// Signed so that zero or negative sizes reach the builder and fail there.
    #[serde(default = "default_pool_size")]
    pub handler_pool_size: i64,
    #[serde(default)]
    pub handler_config: Option<Value>,
}

impl MessageTypeConfig {
    pub fn new(handler_class: impl Into<String>, handler_pool_size: i64) -> Self {
        Self {
            handler_class: handler_class.into(),
            handler_pool_size,
            handler_config: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub settings: Settings,
    #[serde(default)]
    pub message_types: BTreeMap<String, MessageTypeConfig>,
}

impl Config {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            message_types: BTreeMap::new(),
        }
    }

    pub fn with_message_type(mut self, name: &str, entry: MessageTypeConfig) -> Self {
        self.message_types.insert(name.to_string(), entry);
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AtriumError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| AtriumError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.ingress_channel.trim().is_empty() {
            return Err(AtriumError::Config("ingressChannel must not be empty".to_string()));
        }
        if self.settings.egress_channel.trim().is_empty() {
            return Err(AtriumError::Config("egressChannel must not be empty".to_string()));
        }
        if let Some(name) = self.message_types.keys().find(|name| name.trim().is_empty()) {
            return Err(AtriumError::Config(format!("invalid message type name `{name}`")));
        }
        Ok(())
    }
}
