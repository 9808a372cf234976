//! Combat system - fire sequencing, hit resolution, damage

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::replication::protocol::GameEvent;

use super::character::{Character, CharacterTimer};
use super::weapon::{ShootingMode, WeaponKind, WeaponStats};
use super::world::{EntityKind, HitEntity, TraceChannel, TraceHit, World};

/// Where a hit landed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInfo {
    pub impact_point: Vec3,
    pub normal: Vec3,
}

impl From<&TraceHit> for HitInfo {
    fn from(hit: &TraceHit) -> Self {
        Self {
            impact_point: hit.impact_point,
            normal: hit.normal,
        }
    }
}

/// What a single damage application did to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Took damage and is still standing
    Wounded,
    /// This hit started the death sequence
    Killed,
    /// Was already dead; health changed, nothing else did
    AlreadyDead,
}

/// Anything that can receive damage
pub trait Damageable {
    /// `instigator` is the controller credited with the damage
    fn take_damage(&mut self, amount: f32, hit: &HitInfo, instigator: Option<Uuid>) -> DamageOutcome;
}

impl Damageable for Character {
    fn take_damage(&mut self, amount: f32, _hit: &HitInfo, instigator: Option<Uuid>) -> DamageOutcome {
        let depleted = self.vitals.apply_damage(amount);
        if self.flags.dead {
            return DamageOutcome::AlreadyDead;
        }
        if !depleted {
            return DamageOutcome::Wounded;
        }
        self.die(instigator);
        DamageOutcome::Killed
    }
}

impl Character {
    /// Enter the death sequence. Runs once per life.
    fn die(&mut self, instigator: Option<Uuid>) {
        self.flags.clear_actions();
        self.flags.dead = true;
        self.vitals.drain_energy();

        self.timers.pause(CharacterTimer::EnergyTick);
        self.timers.pause(CharacterTimer::Fire);
        self.timers.cancel(CharacterTimer::Reload);

        // Airborne bodies keep colliding until they land
        if self.body.grounded {
            self.body.collision_enabled = false;
        }
        self.body.orient_to_movement = false;
        self.body.move_input = glam::Vec2::ZERO;

        let tuning = self.tuning.clone();
        self.timers
            .set_timer(CharacterTimer::DestroyBody, tuning.body_removal_delay, false);
        self.timers
            .set_timer(CharacterTimer::OfferRespawn, tuning.respawn_delay, false);
        self.timers
            .set_timer(CharacterTimer::Despawn, tuning.despawn_delay, false);

        debug!(character_id = %self.id, instigator = ?instigator, "Character died");
        self.emit(GameEvent::Died {
            character_id: self.id,
            instigator,
        });
    }

    /// Trigger pulled. `from_client` marks a remote request so the owner
    /// gets ammo syncs back.
    pub fn fire_start(&mut self, from_client: bool) -> Option<ShotRequest> {
        self.trigger.fire_from_client = from_client;
        self.trigger.shooting_gate_open = true;

        if !self.trigger.first_shot && self.trigger.delay_shot {
            self.trigger.delay_shot = false;
            return None;
        }

        let has_ammo = self
            .loadout
            .as_ref()
            .is_some_and(|l| l.equipped().has_ammo_in_clip());
        if self.flags.reloading || !self.flags.aiming || !has_ammo {
            return None;
        }

        self.flags.firing = true;
        let shot = self.fire_tick();
        self.trigger.first_shot = false;
        self.arm_fire_timer();
        shot
    }

    /// Trigger released
    pub fn fire_stop(&mut self) {
        self.flags.firing = false;
        self.trigger.delay_shot = true;
        self.trigger.shooting_gate_open = false;
    }

    /// One shot of a held trigger; also the Fire timer callback
    pub fn fire_tick(&mut self) -> Option<ShotRequest> {
        let has_ammo = self
            .loadout
            .as_ref()
            .is_some_and(|l| l.equipped().has_ammo_in_clip());
        if !has_ammo || !self.flags.aiming || self.flags.reloading {
            return None;
        }

        if self.trigger.delay_shot {
            self.trigger.delay_shot = false;
            self.timers.pause(CharacterTimer::Fire);
            if !self.trigger.first_shot {
                return None;
            }
        }

        if self.trigger.first_shot {
            self.arm_fire_timer();
        }

        if !self.trigger.shooting_gate_open {
            return None;
        }

        let mut request = self.shot_request()?;
        let weapon = self.loadout.as_mut()?.equipped_mut();
        weapon.consume_round();
        request.ammo_in_clip = weapon.ammo_in_clip;
        request.remaining_ammo = weapon.remaining_ammo;
        Some(request)
    }

    fn arm_fire_timer(&mut self) {
        if let Some(loadout) = self.loadout.as_ref() {
            let interval = loadout.equipped().stats.fire_interval();
            self.timers.set_timer(CharacterTimer::Fire, interval, true);
        }
    }

    fn shot_request(&self) -> Option<ShotRequest> {
        let weapon = self.loadout.as_ref()?.equipped();
        Some(ShotRequest {
            character_id: self.id,
            instigator: self.owner,
            weapon: weapon.kind,
            stats: weapon.stats,
            eye: self.eye_position(),
            direction: self.body.aim_direction(),
            muzzle: self.body.local_to_world(weapon.stats.muzzle_offset),
            range: self.tuning.shot_range,
            ammo_in_clip: weapon.ammo_in_clip,
            remaining_ammo: weapon.remaining_ammo,
            sync_owner: self.trigger.fire_from_client,
        })
    }
}

/// A shot the character fired, waiting for the arena to resolve it
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRequest {
    pub character_id: Uuid,
    /// Controller credited with any damage
    pub instigator: Option<Uuid>,
    pub weapon: WeaponKind,
    pub stats: WeaponStats,
    /// Aim trace origin
    pub eye: Vec3,
    pub direction: Vec3,
    pub muzzle: Vec3,
    pub range: f32,
    /// Clip and reserve after the round was spent
    pub ammo_in_clip: u32,
    pub remaining_ammo: u32,
    /// Owner needs an ammo sync
    pub sync_owner: bool,
}

impl ShotRequest {
    pub fn trace_end(&self) -> Vec3 {
        self.eye + self.direction * self.range
    }
}

/// Projectile types weapons can spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Rocket,
}

/// Static projectile stats per kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileStats {
    pub speed: f32,
    pub damage: f32,
    /// Impact impulse per unit of velocity
    pub impulse_force: f32,
    pub radius: f32,
    /// Seconds before the projectile expires
    pub lifetime: f32,
}

impl ProjectileStats {
    pub fn for_kind(kind: ProjectileKind) -> Self {
        match kind {
            ProjectileKind::Rocket => Self {
                speed: 7_000.0,
                damage: 80.0,
                impulse_force: 100.0,
                radius: 2.5,
                lifetime: 3.0,
            },
        }
    }
}

/// Active projectile in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: Uuid,
    pub kind: ProjectileKind,
    /// Controller that fired it; looked up, never owned
    pub shooter: Option<Uuid>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub damage: f32,
    pub impulse_force: f32,
    pub radius: f32,
    pub lifetime_remaining: f32,
}

impl Projectile {
    /// Spawn at `origin` heading for `target`
    pub fn new(kind: ProjectileKind, shooter: Option<Uuid>, origin: Vec3, target: Vec3) -> Self {
        let stats = ProjectileStats::for_kind(kind);
        let direction = (target - origin).try_normalize().unwrap_or(Vec3::X);
        Self {
            id: Uuid::new_v4(),
            kind,
            shooter,
            position: origin,
            velocity: direction * stats.speed,
            damage: stats.damage,
            impulse_force: stats.impulse_force,
            radius: stats.radius,
            lifetime_remaining: stats.lifetime,
        }
    }

    /// Impulse delivered to whatever it hits
    pub fn impulse(&self) -> Vec3 {
        self.velocity * self.impulse_force
    }
}

/// How a projectile's step ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileStep {
    Flying,
    Expired,
    Hit(TraceHit),
}

/// Outcome of resolving a shot against the world
#[derive(Debug, Clone, PartialEq)]
pub enum ShotOutcome {
    /// Hit-scan shot; `hit` is `None` when nothing was in range
    Instant { impact_point: Vec3, hit: Option<TraceHit> },
    Projectile(Projectile),
}

/// Combat system for resolving shots and moving projectiles
pub struct CombatSystem;

impl CombatSystem {
    /// Aim trace from the shooter's eye, ignoring the shooter
    pub fn aim_trace(world: &dyn World, request: &ShotRequest) -> Option<TraceHit> {
        world.line_trace(
            request.eye,
            request.trace_end(),
            TraceChannel::Visibility,
            &[request.character_id],
        )
    }

    /// Resolve a fired shot: a trace for instant weapons, a spawned projectile otherwise
    pub fn resolve_shot(world: &dyn World, request: &ShotRequest) -> ShotOutcome {
        let hit = Self::aim_trace(world, request);
        match (request.stats.mode, request.stats.projectile) {
            (ShootingMode::Projectile, Some(kind)) => {
                let aim_point = hit.map_or_else(|| request.trace_end(), |h| h.location);
                ShotOutcome::Projectile(Projectile::new(kind, request.instigator, request.muzzle, aim_point))
            }
            _ => ShotOutcome::Instant {
                impact_point: hit.map_or_else(|| request.trace_end(), |h| h.impact_point),
                hit,
            },
        }
    }

    /// Advance a projectile one step. Other projectiles and anything
    /// `passes_through` accepts are flown through.
    pub fn step_projectile(
        world: &dyn World,
        projectile: &mut Projectile,
        dt: f32,
        passes_through: impl Fn(&HitEntity) -> bool,
    ) -> ProjectileStep {
        let start = projectile.position;
        let end = start + projectile.velocity * dt;
        let mut ignore = vec![projectile.id];

        while let Some(hit) = world.line_trace(start, end, TraceChannel::Visibility, &ignore) {
            match hit.entity {
                Some(entity) if entity.kind == EntityKind::Projectile || passes_through(&entity) => {
                    ignore.push(entity.id);
                }
                _ => {
                    projectile.position = hit.location;
                    return ProjectileStep::Hit(hit);
                }
            }
        }

        projectile.position = end;
        projectile.lifetime_remaining -= dt;
        if projectile.lifetime_remaining <= 0.0 {
            ProjectileStep::Expired
        } else {
            ProjectileStep::Flying
        }
    }
}
