//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::ProjectileKind;
use crate::game::movement::DashDirection;
use crate::game::weapon::WeaponKind;

/// A player action requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    SprintStart,
    SprintStop,
    AimStart,
    AimStop,
    FireStart,
    FireStop,
    Reload,
    SwapWeapon { weapon: WeaponKind },
    Dash { direction: DashDirection },
    Jump,
    /// Movement axes, each in [-1, 1]
    Move { forward: f32, right: f32 },
    /// Facing and aim pitch in radians
    Look { yaw: f32, pitch: f32 },
}

impl Action {
    /// Streamed every client frame; a newer one supersedes any that was dropped
    pub fn is_continuous(&self) -> bool {
        matches!(self, Action::Move { .. } | Action::Look { .. })
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena
    Join {
        #[serde(default)]
        name: Option<String>,
    },

    /// Request an action on the possessed character
    Intent {
        /// Strictly increasing per connection; repeats are dropped
        seq: u32,
        action: Action,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the arena
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { user_id: Uuid, server_time: u64 },

    /// Confirmation of join, addressed to the joining player
    Joined {
        user_id: Uuid,
        match_id: Uuid,
        /// Seed of the spawn point generator
        seed: u64,
        character_id: Option<Uuid>,
        /// All players in the arena at join time
        players: Vec<PlayerInfo>,
    },

    PlayerJoined { player: PlayerInfo },

    PlayerLeft { user_id: Uuid, reason: String },

    /// Replicated properties (sent at regular intervals)
    Snapshot {
        tick: u64,
        characters: Vec<CharacterSnapshot>,
        controllers: Vec<ControllerSnapshot>,
        props: Vec<PropSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
    },

    /// Cosmetic event every observer presents
    Multicast { tick: u64, event: GameEvent },

    /// Owner-only ammo correction after a shot
    AmmoSync {
        user_id: Uuid,
        weapon: WeaponKind,
        ammo_in_clip: u32,
        remaining_ammo: u32,
    },

    Error {
        /// Addressee, or everyone when absent
        user_id: Option<Uuid>,
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        user_id: Uuid,
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// The only player meant to receive this message; `None` means everyone
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            ServerMsg::Joined { user_id, .. }
            | ServerMsg::AmmoSync { user_id, .. }
            | ServerMsg::Pong { user_id, .. } => Some(*user_id),
            ServerMsg::Error { user_id, .. } => *user_id,
            _ => None,
        }
    }
}

/// Player info for join notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: Uuid,
    pub display_name: String,
}

/// Replicated character properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub character_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub aim_pitch: f32,
    pub health: f32,
    pub energy: f32,
    pub sprinting: bool,
    pub aiming: bool,
    pub firing: bool,
    pub reloading: bool,
    pub dead: bool,
    pub jump_count: u32,
    pub reload_time_remaining: f32,
    pub first_shot: bool,
    pub delay_shot: bool,
    pub shooting_gate_open: bool,
    pub fire_from_client: bool,
    pub equipped_weapon: Option<WeaponKind>,
    pub ammo_in_clip: u32,
    pub remaining_ammo: u32,
    pub body_destroyed: bool,
    /// Last intent of the owner applied before this snapshot
    pub last_intent_seq: u32,
}

/// Replicated controller properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub user_id: Uuid,
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub character_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSnapshot {
    pub prop_id: Uuid,
    pub position: Vec3,
    pub health: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub projectile_id: Uuid,
    pub kind: ProjectileKind,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Cosmetic and lifecycle events fanned out to every observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    CharacterSpawned {
        character_id: Uuid,
        owner_id: Option<Uuid>,
        position: Vec3,
    },

    WeaponSwapped { character_id: Uuid, weapon: WeaponKind },

    /// Muzzle flash and fire sound
    WeaponFired {
        character_id: Uuid,
        weapon: WeaponKind,
        muzzle: Vec3,
    },

    /// Hit-scan impact, or the end of a missed trace
    Impact { location: Vec3, normal: Vec3 },

    DamageEffect {
        target_id: Uuid,
        location: Vec3,
        amount: f32,
    },

    ReloadStarted { character_id: Uuid, duration: f32 },

    ProjectileSpawned {
        projectile_id: Uuid,
        kind: ProjectileKind,
        position: Vec3,
        velocity: Vec3,
    },

    ProjectileImpact {
        projectile_id: Uuid,
        location: Vec3,
        impulse: Vec3,
    },

    ProjectileExpired { projectile_id: Uuid },

    Died {
        character_id: Uuid,
        /// Controller credited with the kill
        instigator: Option<Uuid>,
    },

    BodyRemoved { character_id: Uuid },

    Despawned { character_id: Uuid },

    PropDestroyed { prop_id: Uuid },
}
