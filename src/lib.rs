pub mod client;
pub mod config;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod factories;
pub mod handlers;
pub mod interfaces;
pub mod plugins;
pub mod services;

pub use crate::client::AtriumClient;
pub use crate::config::Config;
pub use crate::domains::message::MessageEnvelope;
pub use crate::error::{AtriumError, Result};
pub use crate::factories::switch_factory::SwitchBuilder;
pub use crate::interfaces::handler::MessageHandler;
pub use crate::interfaces::transport::{Transport, TransportEvent};
pub use crate::services::routing::{Forwarded, Switch};
