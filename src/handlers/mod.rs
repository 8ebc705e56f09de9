pub mod console;
pub mod echo;
pub mod ping;

use std::sync::Arc;

use crate::interfaces::handler::MessageHandler;
use crate::plugins::registry::{HandlerRegistry, HandlerSpec};

pub fn register_builtins(registry: &mut HandlerRegistry) {
    registry.register_factory(console::NAME, |_spec: &HandlerSpec| {
        Ok(Arc::new(console::ConsoleHandler) as Arc<dyn MessageHandler>)
    });
    registry.register_factory(echo::NAME, |_spec: &HandlerSpec| {
        Ok(Arc::new(echo::EchoHandler) as Arc<dyn MessageHandler>)
    });
    registry.register_factory(ping::NAME, |spec: &HandlerSpec| {
        Ok(Arc::new(ping::PingHandler::from_spec(spec)?) as Arc<dyn MessageHandler>)
    });
}
