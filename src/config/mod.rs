//! Configuration module - environment variable parsing and gameplay tuning

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Maximum players admitted to one match
    pub max_players_per_match: usize,
    /// Allowed client origins for CORS (comma-separated); permissive when unset
    pub client_origin: Option<String>,
    /// Gameplay constants shared by every match
    pub tuning: GameplayTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let max_players_per_match = match env::var("MAX_PLAYERS_PER_MATCH") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("MAX_PLAYERS_PER_MATCH"))?,
            Err(_) => 16,
        };

        let mut tuning = GameplayTuning::default();
        if let Ok(raw) = env::var("MAX_WALL_JUMPS") {
            // Negative values mean unlimited wall jumps
            let value: i32 = raw.parse().map_err(|_| ConfigError::Invalid("MAX_WALL_JUMPS"))?;
            tuning.max_wall_jumps = u32::try_from(value).ok();
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_players_per_match,
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            tuning,
        })
    }
}

/// Gameplay constants for characters, weapons and the death sequence
#[derive(Clone, Debug, PartialEq)]
pub struct GameplayTuning {
    pub jog_speed: f32,
    pub sprint_speed: f32,
    pub aim_speed: f32,
    /// Vertical velocity of a grounded jump
    pub jump_velocity: f32,
    /// Fraction of ground steering available while airborne
    pub air_control: f32,
    pub gravity: f32,

    pub health_capacity: f32,
    pub energy_capacity: f32,
    /// Energy restored per energy tick
    pub energy_regen: f32,
    /// Energy drained per energy tick while sprinting
    pub sprint_drain: f32,
    /// Seconds between energy ticks
    pub energy_tick_interval: f32,

    pub dash_force: f32,
    pub dash_energy: f32,
    pub wall_jump_energy: f32,
    /// `None` allows unlimited wall jumps
    pub max_wall_jumps: Option<u32>,

    /// Capsule radius used for hit volumes and wall blocking
    pub capsule_radius: f32,
    /// Distance from the capsule centre to the feet
    pub capsule_half_height: f32,
    /// Eye height above the capsule centre, origin of aim traces
    pub eye_height: f32,
    /// Max distance of aim traces
    pub shot_range: f32,

    pub body_removal_delay: f32,
    pub respawn_delay: f32,
    pub despawn_delay: f32,
}

impl Default for GameplayTuning {
    fn default() -> Self {
        Self {
            jog_speed: 600.0,
            sprint_speed: 1200.0,
            aim_speed: 300.0,
            jump_velocity: 450.0,
            air_control: 0.5,
            gravity: 980.0,

            health_capacity: 100.0,
            energy_capacity: 100.0,
            energy_regen: 0.66,
            sprint_drain: 1.0,
            energy_tick_interval: 0.1,

            dash_force: 1500.0,
            dash_energy: 10.0,
            wall_jump_energy: 15.0,
            max_wall_jumps: None,

            capsule_radius: 55.0,
            capsule_half_height: 88.0,
            eye_height: 64.0,
            shot_range: 10_000.0,

            body_removal_delay: 1.0,
            respawn_delay: 5.0,
            despawn_delay: 15.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
