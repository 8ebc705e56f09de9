use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AtriumError, Result};
use crate::interfaces::handler::MessageHandler;

#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub message_type: String,
    pub node_id: String,
    pub index: usize,
    pub config: Value,
}

pub type HandlerFactory =
    Arc<dyn Fn(&HandlerSpec) -> Result<Arc<dyn MessageHandler>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_builtins(&mut registry);
        registry
    }

    pub fn register_factory<F>(&mut self, name: &str, factory: F) -> bool
    where
        F: Fn(&HandlerSpec) -> Result<Arc<dyn MessageHandler>> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return false;
        }
        self.factories.insert(name.to_string(), Arc::new(factory));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(&self, name: &str, spec: &HandlerSpec) -> Result<Arc<dyn MessageHandler>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            AtriumError::HandlerConstruction(format!("unknown handler class `{name}`"))
        })?;
        factory(spec).map_err(|e| match e {
            AtriumError::HandlerConstruction(_) => e,
            other => AtriumError::HandlerConstruction(format!("`{name}`: {other}")),
        })
    }
}
