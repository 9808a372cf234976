//! Application state shared across routes

use std::sync::Arc;

use crate::config::{Config, GameplayTuning};
use crate::game::MatchRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Gameplay constants handed to every new match
    pub tuning: Arc<GameplayTuning>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let tuning = Arc::new(config.tuning.clone());
        Self {
            config: Arc::new(config),
            tuning,
            match_registry: Arc::new(MatchRegistry::new()),
        }
    }
}
