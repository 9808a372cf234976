//! The replicated character entity
//!
//! A character owns its body, vitals, loadout and timers. Ability and combat
//! transitions live in `movement` and `combat`; both only run on the
//! authority, which drains the events they queue into multicasts.

use std::sync::Arc;

use glam::Vec3;
use uuid::Uuid;

use crate::config::GameplayTuning;
use crate::replication::protocol::{CharacterSnapshot, GameEvent};

use super::physics::Body;
use super::resources::Vitals;
use super::scheduler::Scheduler;
use super::weapon::Loadout;

/// Timer identities owned by a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterTimer {
    /// Energy drain/regeneration cadence
    EnergyTick,
    /// Held-trigger fire cadence
    Fire,
    /// Reload completion
    Reload,
    /// Death sequence: remove the body
    DestroyBody,
    /// Death sequence: hand the controller a fresh character
    OfferRespawn,
    /// Death sequence: drop the entity from the arena
    Despawn,
}

/// Independent action flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionFlags {
    pub sprinting: bool,
    pub aiming: bool,
    pub firing: bool,
    pub reloading: bool,
    pub dead: bool,
}

impl ActionFlags {
    pub fn clear_actions(&mut self) {
        self.sprinting = false;
        self.aiming = false;
        self.firing = false;
        self.reloading = false;
    }
}

/// Trigger bookkeeping shared by fire start/stop and the fire timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerState {
    /// Next fire tick (re)arms the fire timer
    pub first_shot: bool,
    /// Swallow the next fire attempt once
    pub delay_shot: bool,
    /// Shots execute only while open
    pub shooting_gate_open: bool,
    /// Trigger was pulled by a remote client
    pub fire_from_client: bool,
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            first_shot: true,
            delay_shot: false,
            shooting_gate_open: false,
            fire_from_client: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Character {
    pub id: Uuid,
    /// Controller possessing this character; cleared when it detaches
    pub owner: Option<Uuid>,
    pub body: Body,
    pub vitals: Vitals,
    pub flags: ActionFlags,
    pub trigger: TriggerState,
    pub jump_count: u32,
    /// `None` once the body (and its weapons) has been destroyed
    pub loadout: Option<Loadout>,
    pub timers: Scheduler<CharacterTimer>,
    pub(crate) tuning: Arc<GameplayTuning>,
    events: Vec<GameEvent>,
}

impl Character {
    /// A freshly spawned character with full vitals, the standard loadout and
    /// its energy timer running
    pub fn spawn(id: Uuid, owner: Option<Uuid>, feet: Vec3, yaw: f32, tuning: Arc<GameplayTuning>) -> Self {
        let mut timers = Scheduler::new();
        timers.set_timer(CharacterTimer::EnergyTick, tuning.energy_tick_interval, true);

        Self {
            id,
            owner,
            body: Body::standing_at(feet, yaw, &tuning),
            vitals: Vitals::full(&tuning),
            flags: ActionFlags::default(),
            trigger: TriggerState::default(),
            jump_count: 0,
            loadout: Some(Loadout::standard()),
            timers,
            tuning,
            events: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &GameplayTuning {
        &self.tuning
    }

    pub fn is_dead(&self) -> bool {
        self.flags.dead
    }

    pub fn body_destroyed(&self) -> bool {
        self.loadout.is_none()
    }

    /// Seconds left on a running reload
    pub fn reload_time_remaining(&self) -> f32 {
        self.timers.remaining(CharacterTimer::Reload).unwrap_or(0.0)
    }

    /// Eye point aim traces start from
    pub fn eye_position(&self) -> Vec3 {
        self.body.position + Vec3::Z * self.tuning.eye_height
    }

    /// Queue a multicast for the authority to fan out
    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Restore walk speed from the aiming/sprinting flags
    pub(crate) fn restore_walk_speed(&mut self) {
        self.body.max_walk_speed = if self.flags.aiming {
            self.tuning.aim_speed
        } else if self.flags.sprinting {
            self.tuning.sprint_speed
        } else {
            self.tuning.jog_speed
        };
    }

    /// Replicated view of this character
    pub fn snapshot(&self, last_intent_seq: u32) -> CharacterSnapshot {
        let equipped = self.loadout.as_ref().map(|l| l.equipped());
        CharacterSnapshot {
            character_id: self.id,
            owner_id: self.owner,
            position: self.body.position,
            velocity: self.body.velocity,
            yaw: self.body.yaw,
            aim_pitch: self.body.pitch,
            health: self.vitals.health,
            energy: self.vitals.energy,
            sprinting: self.flags.sprinting,
            aiming: self.flags.aiming,
            firing: self.flags.firing,
            reloading: self.flags.reloading,
            dead: self.flags.dead,
            jump_count: self.jump_count,
            reload_time_remaining: self.reload_time_remaining(),
            first_shot: self.trigger.first_shot,
            delay_shot: self.trigger.delay_shot,
            shooting_gate_open: self.trigger.shooting_gate_open,
            fire_from_client: self.trigger.fire_from_client,
            equipped_weapon: equipped.map(|w| w.kind),
            ammo_in_clip: equipped.map_or(0, |w| w.ammo_in_clip),
            remaining_ammo: equipped.map_or(0, |w| w.remaining_ammo),
            body_destroyed: self.body_destroyed(),
            last_intent_seq,
        }
    }
}
