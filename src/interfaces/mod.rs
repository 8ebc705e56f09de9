pub mod handler;
pub mod transport;
