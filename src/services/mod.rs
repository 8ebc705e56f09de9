pub mod handler_node;
pub mod ring;
pub mod routing;
pub mod transport;
