//! Game simulation modules

pub mod arena;
pub mod character;
pub mod combat;
pub mod controller;
pub mod lifecycle;
pub mod r#match;
pub mod movement;
pub mod physics;
pub mod prop;
pub mod resources;
pub mod scheduler;
pub mod snapshot;
pub mod weapon;
pub mod world;

pub use arena::Arena;
pub use r#match::{GameMatch, MatchHandle, MatchRegistry};

use crate::replication::protocol::ClientMsg;
use uuid::Uuid;

/// Where a queued input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrigin {
    /// A remote client over the network
    Remote,
    /// The host player on the authority itself
    Local,
}

/// Player input queued for the match loop
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub msg: ClientMsg,
    pub origin: InputOrigin,
    pub received_at: u64,
}
