//! WebSocket transport for the replication protocol

pub mod handler;

pub use handler::ws_handler;
