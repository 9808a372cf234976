//! Shooter Game Server - authoritative game state and replication
//!
//! The library holds the transport-agnostic simulation (`game`), the
//! intent/multicast/snapshot protocol (`replication`) and the axum
//! WebSocket host around them.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod replication;
pub mod util;
pub mod ws;
