//! Movement and ability state machine
//!
//! Sprint, aim, dash, jump/wall-jump, reload and weapon swap transitions.
//! Every method is total: a blocked action returns without touching state.

use glam::{Vec2, Vec3};
use tracing::trace;

use crate::replication::protocol::GameEvent;

use super::character::{Character, CharacterTimer};
use super::resources::EnergyTick;
use super::weapon::WeaponKind;
use super::world::{TraceChannel, World};

/// Distance probed by wall detection, both upward and sideways
const WALL_PROBE_DISTANCE: f32 = 100.0;
/// Radius of the upward sphere sweep
const WALL_PROBE_RADIUS: f32 = 60.0;
/// Vertical launch speed of a wall jump
const WALL_JUMP_UP: f32 = 1_050.0;
/// Horizontal launch speed of a wall jump
const WALL_JUMP_AWAY: f32 = 1_000.0;
/// Upward component added to a dash
const DASH_LIFT: f32 = 50.0;
/// Pitch limit for aim, just short of straight up/down
const MAX_PITCH: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

/// Result of probing for a wall to jump off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallContact {
    /// Nothing close enough
    None,
    /// Wall found on the right; checked first and wins ties
    RightSide,
    LeftSide,
    /// Wall found but neither side trace touched it
    Unsided,
}

/// Dash direction relative to facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashDirection {
    Left,
    Right,
}

impl Character {
    pub fn sprint_start(&mut self) {
        if self.flags.dead {
            return;
        }
        self.flags.sprinting = true;
        if !self.flags.aiming && !self.flags.reloading {
            self.body.max_walk_speed = self.tuning.sprint_speed;
        }
    }

    pub fn sprint_stop(&mut self) {
        self.flags.sprinting = false;
        if !self.flags.aiming {
            self.body.max_walk_speed = self.tuning.jog_speed;
        }
    }

    pub fn aim_start(&mut self) {
        if self.flags.dead {
            return;
        }
        self.flags.aiming = true;
        self.body.orient_to_movement = false;
        self.body.max_walk_speed = self.tuning.aim_speed;
    }

    pub fn aim_stop(&mut self) {
        self.flags.firing = false;
        self.flags.aiming = false;
        self.body.orient_to_movement = true;
        self.body.max_walk_speed = if self.flags.sprinting {
            self.tuning.sprint_speed
        } else {
            self.tuning.jog_speed
        };
    }

    /// Sideways burst; negative force dashes left
    pub fn dash(&mut self, force: f32) {
        if self.flags.dead {
            return;
        }
        let cost = self.tuning.dash_energy;
        if !self.vitals.use_energy(cost) {
            trace!(character_id = %self.id, "Dash blocked: not enough energy");
            return;
        }
        let launch = self.body.right() * force + Vec3::Z * DASH_LIFT;
        self.body.launch(launch);
    }

    pub fn dash_towards(&mut self, direction: DashDirection) {
        let force = match direction {
            DashDirection::Left => -self.tuning.dash_force,
            DashDirection::Right => self.tuning.dash_force,
        };
        self.dash(force);
    }

    /// Ground jump, or a wall jump while airborne
    pub fn jump(&mut self, world: &dyn World) {
        if self.flags.dead {
            return;
        }
        if let Some(max) = self.tuning.max_wall_jumps {
            if self.jump_count > max {
                return;
            }
        }

        if self.body.grounded {
            self.body.jump(self.tuning.jump_velocity);
            self.jump_count += 1;
            return;
        }

        let contact = self.detect_wall(world);
        if contact == WallContact::None {
            trace!(character_id = %self.id, "Wall jump blocked: no wall");
            return;
        }
        let cost = self.tuning.wall_jump_energy;
        if !self.vitals.use_energy(cost) {
            trace!(character_id = %self.id, "Wall jump blocked: not enough energy");
            return;
        }

        let up = self.body.up() * WALL_JUMP_UP;
        let away = match contact {
            WallContact::RightSide => self.body.right() * -WALL_JUMP_AWAY,
            WallContact::LeftSide => self.body.right() * WALL_JUMP_AWAY,
            _ => self.body.forward() * -WALL_JUMP_AWAY,
        };
        self.body.launch(away + up);
        self.jump_count += 1;
    }

    /// Upward sphere sweep for any nearby wall, then right and left line traces
    pub fn detect_wall(&self, world: &dyn World) -> WallContact {
        let start = self.body.position;
        let ignore = [self.id];

        let above = start + self.body.up() * WALL_PROBE_DISTANCE;
        if world
            .sphere_sweep(start, above, WALL_PROBE_RADIUS, TraceChannel::Static, &ignore)
            .is_none()
        {
            return WallContact::None;
        }

        let right = start + self.body.right() * WALL_PROBE_DISTANCE;
        if world
            .line_trace(start, right, TraceChannel::Static, &ignore)
            .is_some()
        {
            return WallContact::RightSide;
        }

        let left = start - self.body.right() * WALL_PROBE_DISTANCE;
        if world
            .line_trace(start, left, TraceChannel::Static, &ignore)
            .is_some()
        {
            return WallContact::LeftSide;
        }

        WallContact::Unsided
    }

    pub fn landed(&mut self) {
        self.jump_count = 0;
        if self.flags.dead {
            self.body.collision_enabled = false;
        }
    }

    pub fn reload_start(&mut self) {
        if self.flags.dead || self.flags.reloading {
            return;
        }
        let duration = match self.loadout.as_ref().map(|l| l.equipped()) {
            Some(weapon) if weapon.can_reload() => weapon.stats.reload_duration,
            _ => return,
        };

        self.flags.firing = false;
        self.flags.reloading = true;

        if self.reload_time_remaining() <= 0.0 {
            self.timers.set_timer(CharacterTimer::Reload, duration, false);
            self.emit(GameEvent::ReloadStarted {
                character_id: self.id,
                duration,
            });
        }

        if !self.flags.aiming {
            self.body.max_walk_speed = self.tuning.jog_speed;
        }
    }

    /// Reload timer expiry
    pub fn finish_reload(&mut self) {
        if !self.flags.reloading {
            return;
        }
        self.flags.reloading = false;
        if let Some(loadout) = self.loadout.as_mut() {
            loadout.equipped_mut().reload();
        }
        self.restore_walk_speed();
    }

    pub fn swap_weapon(&mut self, target: WeaponKind) {
        let Some(loadout) = self.loadout.as_mut() else {
            return;
        };
        loadout.swap_to(target);
        self.trigger.first_shot = true;
        self.emit(GameEvent::WeaponSwapped {
            character_id: self.id,
            weapon: target,
        });
    }

    /// Latest movement axes, each clamped to [-1, 1]
    pub fn move_input(&mut self, forward: f32, right: f32) {
        if self.flags.dead {
            return;
        }
        self.body.move_input = Vec2::new(forward.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0));
    }

    pub fn look(&mut self, yaw: f32, pitch: f32) {
        if self.flags.dead {
            return;
        }
        self.body.yaw = yaw.rem_euclid(std::f32::consts::TAU);
        self.body.pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Energy timer expiry
    pub fn energy_tick(&mut self) {
        if self.flags.dead {
            return;
        }
        let moving = self.body.is_moving();
        let result = self
            .vitals
            .tick_energy(self.flags.sprinting, self.flags.aiming, moving);
        if result == EnergyTick::Exhausted {
            trace!(character_id = %self.id, "Sprint exhausted");
            self.sprint_stop();
        }
    }
}
