//! Match handle, registry and the authoritative tick loop

use dashmap::DashMap;
use glam::Vec3;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameplayTuning;
use crate::replication::protocol::{ClientMsg, GameEvent, ServerMsg};
use crate::util::time::{tick_delta, tick_duration, SIMULATION_TPS, SNAPSHOT_TPS};

use super::arena::Arena;
use super::prop::Prop;
use super::snapshot::SnapshotBuilder;
use super::world::ArenaWorld;
use super::{InputOrigin, PlayerInput};

/// A match nobody joined within this many ticks shuts down
const EMPTY_MATCH_TIMEOUT_TICKS: u64 = SIMULATION_TPS as u64 * 30;

/// Crates scattered around the standard arena
const PROP_LAYOUT: [(f32, f32); 4] = [(800.0, 0.0), (-800.0, 0.0), (0.0, 800.0), (0.0, -800.0)];
const PROP_RADIUS: f32 = 40.0;
const PROP_HEALTH: f32 = 60.0;

/// Error code sent to a player turned away by a full match
pub const MATCH_FULL: &str = "match_full";

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    /// Seated players plus remote joins still in flight to the match task
    seats: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    /// Claim a seat before queueing a remote join. False when every seat is taken.
    pub fn try_reserve_seat(&self, max_players: usize) -> bool {
        self.seats
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max_players).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn reserved_seats(&self) -> usize {
        self.seats.load(Ordering::Acquire)
    }
}

fn release_seat(seats: &AtomicUsize) {
    let _ = seats.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    /// Find a match with a free seat and reserve it
    pub fn reserve_available_match(&self, max_players: usize) -> Option<MatchHandle> {
        self.matches
            .iter()
            .find(|entry| entry.value().try_reserve_seat(max_players))
            .map(|entry| entry.value().clone())
    }

    /// Reserve a seat in a match with room, or start a new one on the standard arena.
    /// The returned handle holds a seat for the caller's remote join.
    pub fn join_or_create(self: &Arc<Self>, max_players: usize, tuning: Arc<GameplayTuning>) -> MatchHandle {
        if let Some(handle) = self.reserve_available_match(max_players) {
            return handle;
        }

        let (game_match, handle) = GameMatch::new(
            Uuid::new_v4(),
            rand::random(),
            max_players,
            tuning,
            ArenaWorld::standard(),
        );
        handle.try_reserve_seat(max_players);
        self.insert(handle.clone());

        let registry = Arc::clone(self);
        let match_id = handle.id;
        tokio::spawn(async move {
            game_match.run().await;
            registry.remove(&match_id);
        });

        handle
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game match
pub struct GameMatch {
    id: Uuid,
    seed: u64,
    max_players: usize,
    arena: Arena,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    seats: Arc<AtomicUsize>,
    had_players: bool,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: Uuid,
        seed: u64,
        max_players: usize,
        tuning: Arc<GameplayTuning>,
        world: ArenaWorld,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));
        let seats = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
            seats: seats.clone(),
        };

        let mut arena = Arena::new(world, tuning, seed);
        for (x, y) in PROP_LAYOUT {
            arena.add_prop(Prop::new(Vec3::new(x, y, PROP_RADIUS), PROP_RADIUS, PROP_HEALTH));
        }

        let game_match = Self {
            id,
            seed,
            max_players,
            arena,
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS),
            player_count,
            seats,
            had_players: false,
        };

        (game_match, handle)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(match_id = %self.id, "Match started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            self.tick();

            let pending = self.seats.load(Ordering::Acquire);
            if self.had_players && self.arena.controllers.is_empty() && pending == 0 {
                info!(match_id = %self.id, "All players left, ending match");
                break;
            }
            if !self.had_players && self.arena.tick >= EMPTY_MATCH_TIMEOUT_TICKS {
                info!(match_id = %self.id, "Nobody joined, ending match");
                break;
            }
        }
    }

    /// One server frame: drain inputs, simulate, fan out
    pub fn tick(&mut self) {
        self.process_inputs();
        self.flush_outbox();

        self.arena.step(tick_delta());
        self.flush_outbox();

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(&self.arena);
            let _ = self.snapshot_tx.send(snapshot);
        }
    }

    /// Process all pending inputs in arrival order
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::Join { name } => {
                    // Remote joins arrive holding a seat claimed through the handle
                    let reserved = input.origin == InputOrigin::Remote;
                    self.handle_join(input.user_id, name.as_deref(), reserved);
                }
                ClientMsg::Intent { seq, action } => {
                    let from_client = input.origin == InputOrigin::Remote;
                    if let Err(e) = self
                        .arena
                        .receive_intent(input.user_id, seq, action, from_client)
                    {
                        debug!(user_id = %input.user_id, error = %e, "Intent dropped");
                    }
                }
                ClientMsg::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong {
                        user_id: input.user_id,
                        t,
                    });
                }
                ClientMsg::Leave => self.handle_leave(input.user_id),
            }
        }
    }

    /// Handle player join request
    fn handle_join(&mut self, user_id: Uuid, name: Option<&str>, reserved: bool) {
        if self.arena.controllers.contains_key(&user_id) {
            warn!(user_id = %user_id, "Player already in match");
            if reserved {
                release_seat(&self.seats);
            }
            return;
        }

        if self.arena.controllers.len() >= self.max_players {
            if reserved {
                release_seat(&self.seats);
            }
            let _ = self.snapshot_tx.send(ServerMsg::Error {
                user_id: Some(user_id),
                code: MATCH_FULL.to_string(),
                message: "Match is full".to_string(),
            });
            return;
        }

        if !reserved {
            self.seats.fetch_add(1, Ordering::AcqRel);
        }
        self.arena.add_player(user_id, name);
        let character_id = self.arena.spawn_character(user_id);
        self.had_players = true;
        self.player_count
            .store(self.arena.controllers.len(), Ordering::Relaxed);

        if let Some(controller) = self.arena.controllers.get(&user_id) {
            let _ = self.snapshot_tx.send(ServerMsg::PlayerJoined {
                player: controller.info(),
            });
        }

        let players = self.arena.controllers.values().map(|p| p.info()).collect();
        let _ = self.snapshot_tx.send(ServerMsg::Joined {
            user_id,
            match_id: self.id,
            seed: self.seed,
            character_id,
            players,
        });
        self.snapshot_builder.force_next();

        info!(
            match_id = %self.id,
            user_id = %user_id,
            player_count = self.arena.controllers.len(),
            "Player joined match"
        );
    }

    /// Handle player leave
    fn handle_leave(&mut self, user_id: Uuid) {
        if self.arena.remove_player(user_id).is_none() {
            return;
        }
        release_seat(&self.seats);
        self.player_count
            .store(self.arena.controllers.len(), Ordering::Relaxed);

        let _ = self.snapshot_tx.send(ServerMsg::PlayerLeft {
            user_id,
            reason: "disconnected".to_string(),
        });

        info!(match_id = %self.id, user_id = %user_id, "Player left match");
    }

    /// Send everything the arena queued; deaths get an early snapshot
    fn flush_outbox(&mut self) {
        for msg in self.arena.drain_outbox() {
            if matches!(
                msg,
                ServerMsg::Multicast {
                    event: GameEvent::Died { .. },
                    ..
                }
            ) {
                self.snapshot_builder.force_next();
            }
            let _ = self.snapshot_tx.send(msg);
        }
    }
}
