//! Authoritative arena state and the per-tick simulation step
//!
//! The arena owns every entity by id. Characters, controllers, props and
//! projectiles refer to each other only through these tables, so a stale id
//! resolves to nothing instead of dangling.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameplayTuning;
use crate::replication::protocol::{GameEvent, ServerMsg};

use super::character::{Character, CharacterTimer};
use super::combat::{CombatSystem, DamageOutcome, Damageable, HitInfo, Projectile, ProjectileStep, ShotOutcome, ShotRequest};
use super::controller::PlayerController;
use super::physics::PhysicsSystem;
use super::prop::Prop;
use super::world::{ArenaWorld, DynamicCollider, EntityKind, HitEntity};

/// The authoritative simulation of one match
pub struct Arena {
    pub(crate) tuning: Arc<GameplayTuning>,
    pub world: ArenaWorld,
    pub characters: HashMap<Uuid, Character>,
    pub controllers: HashMap<Uuid, PlayerController>,
    pub props: HashMap<Uuid, Prop>,
    pub projectiles: Vec<Projectile>,
    pub(crate) rng: ChaCha8Rng,
    pub tick: u64,
    /// Messages waiting to be fanned out by the match loop
    outbox: Vec<ServerMsg>,
}

impl Arena {
    pub fn new(world: ArenaWorld, tuning: Arc<GameplayTuning>, seed: u64) -> Self {
        Self {
            tuning,
            world,
            characters: HashMap::new(),
            controllers: HashMap::new(),
            props: HashMap::new(),
            projectiles: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            outbox: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &GameplayTuning {
        &self.tuning
    }

    pub fn add_prop(&mut self, prop: Prop) -> Uuid {
        let id = prop.id;
        self.props.insert(id, prop);
        self.rebuild_dynamics();
        id
    }

    /// Character possessed by `user_id`
    pub fn character_of(&self, user_id: Uuid) -> Option<&Character> {
        let id = self.controllers.get(&user_id)?.character?;
        self.characters.get(&id)
    }

    pub fn drain_outbox(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn send(&mut self, msg: ServerMsg) {
        self.outbox.push(msg);
    }

    pub(crate) fn multicast(&mut self, event: GameEvent) {
        self.outbox.push(ServerMsg::Multicast {
            tick: self.tick,
            event,
        });
    }

    /// Move events a character queued into the outbox
    pub(crate) fn flush_character(&mut self, id: Uuid) {
        let events = match self.characters.get_mut(&id) {
            Some(character) => character.drain_events(),
            None => return,
        };
        for event in events {
            self.multicast(event);
        }
    }

    /// Run one simulation tick: movement, timers, then projectiles
    pub fn step(&mut self, dt: f32) {
        self.tick += 1;

        let mut ids: Vec<Uuid> = self.characters.keys().copied().collect();
        ids.sort();

        let mut fallen = Vec::new();
        for id in &ids {
            let Some(character) = self.characters.get_mut(id) else {
                continue;
            };
            let outcome = PhysicsSystem::step(&mut character.body, &character.tuning, &self.world, dt);
            if outcome.landed {
                character.landed();
            }
            if outcome.fell_out_of_world && !character.is_dead() {
                fallen.push(*id);
            }
        }
        for id in fallen {
            self.fell_out_of_world(id);
        }
        self.rebuild_dynamics();

        for id in &ids {
            let fired = match self.characters.get_mut(id) {
                Some(character) => character.timers.advance(dt),
                None => continue,
            };
            for timer in fired {
                self.on_character_timer(*id, timer);
            }
        }

        self.step_projectiles(dt);

        for id in ids {
            self.flush_character(id);
        }
        self.rebuild_dynamics();
    }

    fn on_character_timer(&mut self, id: Uuid, timer: CharacterTimer) {
        match timer {
            CharacterTimer::EnergyTick => {
                if let Some(character) = self.characters.get_mut(&id) {
                    character.energy_tick();
                }
            }
            CharacterTimer::Fire => {
                let shot = self.characters.get_mut(&id).and_then(|c| c.fire_tick());
                if let Some(shot) = shot {
                    self.execute_shot(shot);
                }
            }
            CharacterTimer::Reload => {
                if let Some(character) = self.characters.get_mut(&id) {
                    character.finish_reload();
                }
            }
            CharacterTimer::DestroyBody => self.remove_body(id),
            CharacterTimer::OfferRespawn => self.offer_respawn(id),
            CharacterTimer::Despawn => self.despawn(id),
        }
        self.flush_character(id);
    }

    /// Fan out a fired shot and resolve it against the world
    pub fn execute_shot(&mut self, request: ShotRequest) {
        self.flush_character(request.character_id);
        self.multicast(GameEvent::WeaponFired {
            character_id: request.character_id,
            weapon: request.weapon,
            muzzle: request.muzzle,
        });

        match CombatSystem::resolve_shot(&self.world, &request) {
            ShotOutcome::Instant { impact_point, hit } => {
                self.multicast(GameEvent::Impact {
                    location: impact_point,
                    normal: hit.map_or(-request.direction, |h| h.normal),
                });
                if let Some((entity, hit)) = hit.and_then(|h| h.entity.map(|e| (e, h))) {
                    self.apply_damage(entity, request.stats.damage, HitInfo::from(&hit), request.instigator);
                }
            }
            ShotOutcome::Projectile(projectile) => {
                self.multicast(GameEvent::ProjectileSpawned {
                    projectile_id: projectile.id,
                    kind: projectile.kind,
                    position: projectile.position,
                    velocity: projectile.velocity,
                });
                self.projectiles.push(projectile);
            }
        }

        if request.sync_owner {
            if let Some(user_id) = request.instigator {
                self.send(ServerMsg::AmmoSync {
                    user_id,
                    weapon: request.weapon,
                    ammo_in_clip: request.ammo_in_clip,
                    remaining_ammo: request.remaining_ammo,
                });
            }
        }
    }

    fn damageable_mut(&mut self, target: HitEntity) -> Option<&mut dyn Damageable> {
        match target.kind {
            EntityKind::Character => self
                .characters
                .get_mut(&target.id)
                .map(|c| c as &mut dyn Damageable),
            EntityKind::Prop => self.props.get_mut(&target.id).map(|p| p as &mut dyn Damageable),
            EntityKind::Projectile => None,
        }
    }

    /// Route damage to whatever `target` is. `None` when it cannot take damage.
    pub fn apply_damage(
        &mut self,
        target: HitEntity,
        amount: f32,
        hit: HitInfo,
        instigator: Option<Uuid>,
    ) -> Option<DamageOutcome> {
        let outcome = self
            .damageable_mut(target)?
            .take_damage(amount, &hit, instigator);

        self.multicast(GameEvent::DamageEffect {
            target_id: target.id,
            location: hit.impact_point,
            amount,
        });

        match (target.kind, outcome) {
            (EntityKind::Character, DamageOutcome::Killed) => self.record_kill(target.id, instigator),
            (EntityKind::Prop, DamageOutcome::Killed) => {
                self.props.remove(&target.id);
                self.multicast(GameEvent::PropDestroyed { prop_id: target.id });
            }
            _ => {}
        }
        if outcome == DamageOutcome::Killed {
            self.drop_stale_collider(target);
        }

        if target.kind == EntityKind::Character {
            self.flush_character(target.id);
        }
        Some(outcome)
    }

    /// A kill can stop an entity blocking mid-tick; later traces this tick must not hit it
    fn drop_stale_collider(&mut self, target: HitEntity) {
        let blocking = match target.kind {
            EntityKind::Character => self
                .characters
                .get(&target.id)
                .is_some_and(|c| c.body.collision_enabled),
            EntityKind::Prop => self.props.contains_key(&target.id),
            EntityKind::Projectile => true,
        };
        if !blocking {
            self.world.remove_dynamic(target.id);
        }
    }

    /// Kill/death bookkeeping for a character that just died
    fn record_kill(&mut self, victim: Uuid, instigator: Option<Uuid>) {
        let victim_controller = self.characters.get(&victim).and_then(|c| c.owner);

        if let Some(killer) = instigator.filter(|k| Some(*k) != victim_controller) {
            if let Some(controller) = self.controllers.get_mut(&killer) {
                controller.kills += 1;
            }
        }
        if let Some(controller) = victim_controller.and_then(|id| self.controllers.get_mut(&id)) {
            controller.deaths += 1;
        }

        info!(
            character_id = %victim,
            victim = ?victim_controller,
            killer = ?instigator,
            "Character killed"
        );
    }

    fn step_projectiles(&mut self, dt: f32) {
        let mut survivors = Vec::with_capacity(self.projectiles.len());

        for mut projectile in std::mem::take(&mut self.projectiles) {
            let shooter = projectile.shooter;
            let characters = &self.characters;
            let step = CombatSystem::step_projectile(&self.world, &mut projectile, dt, |entity| {
                entity.kind == EntityKind::Character
                    && shooter.is_some()
                    && characters.get(&entity.id).and_then(|c| c.owner) == shooter
            });

            match step {
                ProjectileStep::Flying => survivors.push(projectile),
                ProjectileStep::Expired => {
                    debug!(projectile_id = %projectile.id, "Projectile expired");
                    self.multicast(GameEvent::ProjectileExpired {
                        projectile_id: projectile.id,
                    });
                }
                ProjectileStep::Hit(hit) => {
                    if let Some(entity) = hit.entity {
                        self.apply_damage(entity, projectile.damage, HitInfo::from(&hit), projectile.shooter);
                    }
                    self.multicast(GameEvent::ProjectileImpact {
                        projectile_id: projectile.id,
                        location: hit.impact_point,
                        impulse: projectile.impulse(),
                    });
                }
            }
        }

        survivors.append(&mut self.projectiles);
        self.projectiles = survivors;
    }

    /// Refresh the world's dynamic colliders from live entities
    pub(crate) fn rebuild_dynamics(&mut self) {
        let mut colliders = Vec::new();

        // Two stacked spheres approximate the capsule
        let radius = self.tuning.capsule_radius;
        let offset = (self.tuning.capsule_half_height - radius).max(0.0);
        for character in self.characters.values().filter(|c| c.body.collision_enabled) {
            let entity = HitEntity {
                id: character.id,
                kind: EntityKind::Character,
            };
            for center in [
                character.body.position + Vec3::Z * offset,
                character.body.position - Vec3::Z * offset,
            ] {
                colliders.push(DynamicCollider { entity, center, radius });
            }
        }

        colliders.extend(self.props.values().filter(|p| !p.destroyed).map(|p| DynamicCollider {
            entity: HitEntity {
                id: p.id,
                kind: EntityKind::Prop,
            },
            center: p.position,
            radius: p.radius,
        }));

        colliders.extend(self.projectiles.iter().map(|p| DynamicCollider {
            entity: HitEntity {
                id: p.id,
                kind: EntityKind::Projectile,
            },
            center: p.position,
            radius: p.radius,
        }));

        self.world.set_dynamics(colliders);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::game::world::Aabb;

    /// Flat open floor with one spawn point at the origin
    pub fn open_arena() -> Arena {
        let mut world = ArenaWorld::empty(-1_000.0);
        world.add_box(Aabb::new(Vec3::new(-5_000.0, -5_000.0, -10.0), Vec3::new(5_000.0, 5_000.0, 0.0)));
        world.add_spawn_point(Vec3::ZERO);
        Arena::new(world, Arc::new(GameplayTuning::default()), 7)
    }

    /// Join a player and move their character to `feet` facing +X
    pub fn player_at(arena: &mut Arena, feet: Vec3) -> (Uuid, Uuid) {
        let user_id = Uuid::new_v4();
        arena.add_player(user_id, None);
        let character_id = arena.spawn_character(user_id).expect("spawned");
        let half_height = arena.tuning.capsule_half_height;
        if let Some(c) = arena.characters.get_mut(&character_id) {
            c.body.position = feet + Vec3::Z * half_height;
            c.body.yaw = 0.0;
        }
        arena.rebuild_dynamics();
        (user_id, character_id)
    }

    pub fn events(arena: &mut Arena) -> Vec<GameEvent> {
        arena
            .drain_outbox()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMsg::Multicast { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }
}
