//! Authority-side intent validation and execution

use tracing::debug;
use uuid::Uuid;

use crate::game::arena::Arena;

use super::protocol::Action;

/// Why an intent was dropped. Logged, never sent back to the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("Intent payload contains a non-finite number")]
    NonFinite,

    #[error("Unknown player {0}")]
    UnknownPlayer(Uuid),

    #[error("Player {0} has no character")]
    NoCharacter(Uuid),

    #[error("Stale intent sequence {seq} (last accepted {last})")]
    StaleSequence { seq: u32, last: u32 },
}

/// Structural checks only; whether the action is allowed is decided by the action itself
pub fn validate_action(action: &Action) -> Result<(), IntentError> {
    let finite = match *action {
        Action::Move { forward, right } => forward.is_finite() && right.is_finite(),
        Action::Look { yaw, pitch } => yaw.is_finite() && pitch.is_finite(),
        _ => true,
    };
    if finite {
        Ok(())
    } else {
        Err(IntentError::NonFinite)
    }
}

impl Arena {
    /// Validate an intent from `user_id` and run it on their character.
    /// Intents whose sequence number was already seen are dropped.
    pub fn receive_intent(
        &mut self,
        user_id: Uuid,
        seq: u32,
        action: Action,
        from_client: bool,
    ) -> Result<(), IntentError> {
        validate_action(&action)?;

        let controller = self
            .controllers
            .get_mut(&user_id)
            .ok_or(IntentError::UnknownPlayer(user_id))?;
        let last = controller.last_intent_seq;
        if !controller.accept_sequence(seq) {
            return Err(IntentError::StaleSequence { seq, last });
        }
        let character_id = controller
            .character
            .filter(|id| self.characters.contains_key(id))
            .ok_or(IntentError::NoCharacter(user_id))?;

        self.execute(character_id, action, from_client);
        Ok(())
    }

    /// Run an action on a character. Blocked actions are silent no-ops.
    pub fn execute(&mut self, character_id: Uuid, action: Action, from_client: bool) {
        let world = &self.world;
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };

        let shot = match action {
            Action::SprintStart => {
                character.sprint_start();
                None
            }
            Action::SprintStop => {
                character.sprint_stop();
                None
            }
            Action::AimStart => {
                character.aim_start();
                None
            }
            Action::AimStop => {
                character.aim_stop();
                None
            }
            Action::FireStart => character.fire_start(from_client),
            Action::FireStop => {
                character.fire_stop();
                None
            }
            Action::Reload => {
                character.reload_start();
                None
            }
            Action::SwapWeapon { weapon } => {
                character.swap_weapon(weapon);
                None
            }
            Action::Dash { direction } => {
                character.dash_towards(direction);
                None
            }
            Action::Jump => {
                character.jump(world);
                None
            }
            Action::Move { forward, right } => {
                character.move_input(forward, right);
                None
            }
            Action::Look { yaw, pitch } => {
                character.look(yaw, pitch);
                None
            }
        };

        debug!(character_id = %character_id, action = ?action, "Executed action");
        match shot {
            Some(shot) => self.execute_shot(shot),
            None => self.flush_character(character_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::test_support::{events, open_arena, player_at};
    use crate::game::movement::DashDirection;
    use crate::game::weapon::WeaponKind;
    use crate::replication::protocol::{GameEvent, ServerMsg};
    use glam::Vec3;

    #[test]
    fn non_finite_payloads_are_rejected() {
        let bad = Action::Look {
            yaw: f32::NAN,
            pitch: 0.0,
        };
        assert_eq!(validate_action(&bad), Err(IntentError::NonFinite));
        assert!(validate_action(&Action::Jump).is_ok());
    }

    #[test]
    fn duplicate_intents_apply_once() {
        let mut arena = open_arena();
        let (user_id, character_id) = player_at(&mut arena, Vec3::ZERO);

        arena
            .receive_intent(user_id, 1, Action::Dash { direction: DashDirection::Right }, true)
            .unwrap();
        let err = arena
            .receive_intent(user_id, 1, Action::Dash { direction: DashDirection::Right }, true)
            .unwrap_err();
        assert_eq!(err, IntentError::StaleSequence { seq: 1, last: 1 });

        let energy = arena.characters[&character_id].vitals.energy;
        assert_eq!(energy, 90.0);
    }

    #[test]
    fn unknown_players_and_empty_controllers_are_refused() {
        let mut arena = open_arena();
        let stranger = Uuid::new_v4();
        assert_eq!(
            arena.receive_intent(stranger, 1, Action::Jump, true),
            Err(IntentError::UnknownPlayer(stranger))
        );

        let user_id = Uuid::new_v4();
        arena.add_player(user_id, None);
        assert_eq!(
            arena.receive_intent(user_id, 1, Action::Jump, true),
            Err(IntentError::NoCharacter(user_id))
        );
    }

    #[test]
    fn swap_is_multicast_to_observers() {
        let mut arena = open_arena();
        let (user_id, character_id) = player_at(&mut arena, Vec3::ZERO);
        arena.drain_outbox();

        arena
            .receive_intent(
                user_id,
                1,
                Action::SwapWeapon {
                    weapon: WeaponKind::RocketLauncher,
                },
                true,
            )
            .unwrap();
        assert_eq!(
            events(&mut arena),
            vec![GameEvent::WeaponSwapped {
                character_id,
                weapon: WeaponKind::RocketLauncher
            }]
        );
    }

    #[test]
    fn local_fire_skips_ammo_sync() {
        let mut arena = open_arena();
        let (user_id, _) = player_at(&mut arena, Vec3::ZERO);
        arena.receive_intent(user_id, 1, Action::AimStart, false).unwrap();
        arena.receive_intent(user_id, 2, Action::FireStart, false).unwrap();
        let outbox = arena.drain_outbox();
        assert!(!outbox.iter().any(|m| matches!(m, ServerMsg::AmmoSync { .. })));
        assert!(outbox.iter().any(|m| matches!(
            m,
            ServerMsg::Multicast {
                event: GameEvent::WeaponFired { .. },
                ..
            }
        )));
    }

    #[test]
    fn dead_characters_ignore_movement() {
        let mut arena = open_arena();
        let (user_id, character_id) = player_at(&mut arena, Vec3::ZERO);
        if let Some(c) = arena.characters.get_mut(&character_id) {
            c.flags.dead = true;
        }
        arena
            .receive_intent(
                user_id,
                1,
                Action::Move {
                    forward: 1.0,
                    right: 0.0,
                },
                true,
            )
            .unwrap();
        assert_eq!(arena.characters[&character_id].body.move_input, glam::Vec2::ZERO);
    }
}
