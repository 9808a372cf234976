//! Spawning, the death sequence and teardown

use glam::Vec3;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::replication::protocol::GameEvent;

use super::arena::Arena;
use super::character::Character;
use super::combat::HitInfo;
use super::controller::PlayerController;
use super::world::{EntityKind, HitEntity};

impl Arena {
    /// Register a controller for `user_id`. Returns false when already present.
    pub fn add_player(&mut self, user_id: Uuid, requested_name: Option<&str>) -> bool {
        if self.controllers.contains_key(&user_id) {
            return false;
        }
        let controller = PlayerController::new(user_id, requested_name);
        info!(user_id = %user_id, display_name = %controller.display_name, "Player added to arena");
        self.controllers.insert(user_id, controller);
        true
    }

    /// Spawn a fresh character for the controller and possess it.
    /// A controller that already possesses a character keeps it.
    pub fn spawn_character(&mut self, user_id: Uuid) -> Option<Uuid> {
        if let Some(existing) = self.controllers.get(&user_id)?.character {
            return Some(existing);
        }

        let (feet, yaw) = self.pick_spawn_point();
        let id = Uuid::new_v4();
        let character = Character::spawn(id, Some(user_id), feet, yaw, self.tuning.clone());
        let position = character.body.position;
        self.characters.insert(id, character);

        if let Some(controller) = self.controllers.get_mut(&user_id) {
            controller.character = Some(id);
        }

        debug!(user_id = %user_id, character_id = %id, "Character spawned");
        self.multicast(GameEvent::CharacterSpawned {
            character_id: id,
            owner_id: Some(user_id),
            position,
        });
        self.rebuild_dynamics();
        Some(id)
    }

    fn pick_spawn_point(&mut self) -> (Vec3, f32) {
        let yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let points = self.world.spawn_points();
        if points.is_empty() {
            return (Vec3::ZERO, yaw);
        }
        let index = self.rng.gen_range(0..points.len());
        (points[index], yaw)
    }

    /// First step of the death sequence: the weapons go with the body
    pub(crate) fn remove_body(&mut self, character_id: Uuid) {
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };
        character.loadout = None;
        self.multicast(GameEvent::BodyRemoved { character_id });
    }

    /// Detach the owner from its dead character and give it a fresh one
    pub(crate) fn offer_respawn(&mut self, character_id: Uuid) {
        let Some(owner) = self
            .characters
            .get_mut(&character_id)
            .and_then(|c| c.owner.take())
        else {
            return;
        };

        if let Some(controller) = self.controllers.get_mut(&owner) {
            if controller.character == Some(character_id) {
                controller.character = None;
            }
        }
        self.spawn_character(owner);
    }

    /// Last step of the death sequence; independent of when the owner respawned
    pub(crate) fn despawn(&mut self, character_id: Uuid) {
        let Some(character) = self.characters.remove(&character_id) else {
            return;
        };
        if let Some(controller) = character.owner.and_then(|id| self.controllers.get_mut(&id)) {
            if controller.character == Some(character_id) {
                controller.character = None;
            }
        }
        debug!(character_id = %character_id, "Character despawned");
        self.multicast(GameEvent::Despawned { character_id });
        self.rebuild_dynamics();
    }

    /// Player left: the controller goes, and its character goes with it
    pub fn remove_player(&mut self, user_id: Uuid) -> Option<PlayerController> {
        let controller = self.controllers.remove(&user_id)?;
        if let Some(character_id) = controller.character {
            if self.characters.remove(&character_id).is_some() {
                self.multicast(GameEvent::Despawned { character_id });
            }
        }
        self.rebuild_dynamics();
        info!(user_id = %user_id, "Player removed from arena");
        Some(controller)
    }

    /// Below the kill plane: lethal damage with nobody credited
    pub(crate) fn fell_out_of_world(&mut self, character_id: Uuid) {
        let Some(character) = self.characters.get(&character_id) else {
            return;
        };
        if character.is_dead() {
            return;
        }
        let amount = character.vitals.health.max(0.0);
        let hit = HitInfo {
            impact_point: character.body.position,
            normal: Vec3::Z,
        };
        debug!(character_id = %character_id, "Character fell out of the world");
        self.apply_damage(
            HitEntity {
                id: character_id,
                kind: EntityKind::Character,
            },
            amount,
            hit,
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::test_support::{events, open_arena, player_at};
    use crate::game::character::CharacterTimer;

    const DT: f32 = 1.0 / 30.0;

    fn run_for(arena: &mut Arena, seconds: f32) {
        let ticks = (seconds / DT).round() as usize;
        for _ in 0..ticks {
            arena.step(DT);
        }
    }

    fn kill(arena: &mut Arena, character_id: Uuid) {
        let entity = HitEntity {
            id: character_id,
            kind: EntityKind::Character,
        };
        let hit = HitInfo {
            impact_point: Vec3::ZERO,
            normal: Vec3::Z,
        };
        arena.apply_damage(entity, 1_000.0, hit, None);
    }

    #[test]
    fn spawn_possesses_a_full_character() {
        let mut arena = open_arena();
        let user_id = Uuid::new_v4();
        assert!(arena.add_player(user_id, Some("Ripley")));
        assert!(!arena.add_player(user_id, Some("Again")));

        let character_id = arena.spawn_character(user_id).expect("spawned");
        assert_eq!(arena.spawn_character(user_id), Some(character_id));

        let character = arena.character_of(user_id).expect("possessed");
        assert_eq!(character.owner, Some(user_id));
        assert!(character.timers.is_active(CharacterTimer::EnergyTick));
        assert!(events(&mut arena)
            .iter()
            .any(|e| matches!(e, GameEvent::CharacterSpawned { character_id: id, .. } if *id == character_id)));
    }

    #[test]
    fn spawn_points_are_seeded() {
        let picks = |seed: u64| {
            let mut arena = open_arena();
            arena.rng = rand::SeedableRng::seed_from_u64(seed);
            for i in 0..4 {
                arena.world.add_spawn_point(Vec3::new(i as f32 * 100.0, 0.0, 0.0));
            }
            (0..6).map(|_| arena.pick_spawn_point()).collect::<Vec<_>>()
        };
        assert_eq!(picks(11), picks(11));
    }

    #[test]
    fn death_sequence_runs_on_schedule() {
        let mut arena = open_arena();
        let (user_id, old) = player_at(&mut arena, Vec3::ZERO);
        kill(&mut arena, old);
        arena.drain_outbox();

        run_for(&mut arena, 1.1);
        assert!(arena.characters[&old].body_destroyed());
        assert!(events(&mut arena)
            .iter()
            .any(|e| matches!(e, GameEvent::BodyRemoved { character_id } if *character_id == old)));
        assert_eq!(arena.controllers[&user_id].character, Some(old));

        run_for(&mut arena, 4.0);
        let fresh = arena.controllers[&user_id].character.expect("respawned");
        assert_ne!(fresh, old);
        assert_eq!(arena.characters[&old].owner, None);
        assert_eq!(arena.characters[&fresh].vitals.health, 100.0);

        run_for(&mut arena, 10.0);
        assert!(!arena.characters.contains_key(&old));
        assert!(arena.characters.contains_key(&fresh));
        assert_eq!(arena.controllers[&user_id].character, Some(fresh));
        assert_eq!(arena.controllers[&user_id].deaths, 1);
    }

    #[test]
    fn leaving_removes_character_and_weapons() {
        let mut arena = open_arena();
        let (user_id, character_id) = player_at(&mut arena, Vec3::ZERO);
        let controller = arena.remove_player(user_id).expect("present");
        assert_eq!(controller.character, Some(character_id));
        assert!(arena.characters.is_empty());
        assert!(arena.world.dynamics().is_empty());
        assert!(arena.remove_player(user_id).is_none());
    }

    #[test]
    fn falling_out_of_the_world_is_lethal_without_credit() {
        let mut arena = open_arena();
        let (user_id, character_id) = player_at(&mut arena, Vec3::new(0.0, 0.0, -990.0));
        if let Some(c) = arena.characters.get_mut(&character_id) {
            c.body.grounded = false;
        }

        run_for(&mut arena, 1.0);
        let character = &arena.characters[&character_id];
        assert!(character.is_dead());
        assert_eq!(character.vitals.health, 0.0);
        assert_eq!(arena.controllers[&user_id].deaths, 1);
        assert_eq!(arena.controllers[&user_id].kills, 0);
    }
}
