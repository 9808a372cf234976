//! Action replication: client intents in, multicasts and snapshots out
//!
//! Every player action goes through three steps. The observer that wants it
//! sends an intent and changes nothing locally. The authority validates and
//! runs it on its single timeline. State changes flow back as periodic
//! snapshots and cosmetic multicasts, which observers only present.

pub mod authority;
pub mod protocol;

use std::collections::HashMap;

use glam::Vec3;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::weapon::WeaponKind;
use crate::game::{InputOrigin, PlayerInput};
use crate::util::time::unix_millis;

use protocol::{Action, CharacterSnapshot, ClientMsg, ControllerSnapshot, GameEvent, ServerMsg};

pub use authority::{validate_action, IntentError};

/// Which side of the connection an endpoint runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Observer,
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Transport queue full")]
    Full,
}

/// Fire-and-forget delivery of client messages to the authority
pub trait Transport {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError>;
}

impl Transport for mpsc::Sender<ClientMsg> {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        self.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}

impl Transport for mpsc::UnboundedSender<ClientMsg> {
    fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        mpsc::UnboundedSender::send(self, msg).map_err(|_| TransportError::Closed)
    }
}

/// Remote player's side: numbers intents and ships them off
#[derive(Debug)]
pub struct ObserverSession<T> {
    transport: T,
    next_seq: u32,
}

impl<T: Transport> ObserverSession<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, next_seq: 1 }
    }

    /// Ask the authority to perform `action`. Returns the sequence number used.
    pub fn request(&mut self, action: Action) -> Result<u32, TransportError> {
        let seq = self.next_seq;
        self.transport.send(ClientMsg::Intent { seq, action })?;
        self.next_seq += 1;
        Ok(seq)
    }

    pub fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        self.transport.send(msg)
    }
}

/// Host player living on the authority (listen server)
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    pub user_id: Uuid,
    input_tx: mpsc::Sender<PlayerInput>,
    next_seq: u32,
}

impl LocalPlayer {
    pub fn new(user_id: Uuid, input_tx: mpsc::Sender<PlayerInput>) -> Self {
        Self {
            user_id,
            input_tx,
            next_seq: 1,
        }
    }

    /// Queue a message on the match timeline as a local, trusted input
    pub fn send(&self, msg: ClientMsg) -> Result<(), TransportError> {
        let input = PlayerInput {
            user_id: self.user_id,
            msg,
            origin: InputOrigin::Local,
            received_at: unix_millis(),
        };
        self.input_tx.try_send(input).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    pub fn request(&mut self, action: Action) -> Result<u32, TransportError> {
        let seq = self.next_seq;
        self.send(ClientMsg::Intent { seq, action })?;
        self.next_seq += 1;
        Ok(seq)
    }
}

/// Where a player's actions originate
#[derive(Debug)]
pub enum Endpoint<T> {
    /// Executes on the authority without a round trip; never asks for ammo syncs
    Authority(LocalPlayer),
    /// Forwards intents and waits for replication
    Observer(ObserverSession<T>),
}

impl<T: Transport> Endpoint<T> {
    pub fn role(&self) -> Role {
        match self {
            Endpoint::Authority(_) => Role::Authority,
            Endpoint::Observer(_) => Role::Observer,
        }
    }

    pub fn perform(&mut self, action: Action) -> Result<u32, TransportError> {
        match self {
            Endpoint::Authority(local) => local.request(action),
            Endpoint::Observer(session) => session.request(action),
        }
    }
}

/// Cosmetic effects observers can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectId {
    MuzzleFlash,
    Impact,
    Damage,
    Explosion,
    Spawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundId {
    WeaponFire(WeaponKind),
    Impact,
    Explosion,
    Death,
}

/// Observer-side presentation hooks. Never mutates gameplay state.
pub trait Presentation {
    fn play_effect(&mut self, effect: EffectId, location: Vec3);
    fn play_sound(&mut self, sound: SoundId, location: Vec3);
    fn set_weapon_visible(&mut self, character_id: Uuid, weapon: WeaponKind, visible: bool);
    fn play_reload_animation(&mut self, character_id: Uuid, duration: f32);
    fn hide_body(&mut self, character_id: Uuid);
}

/// Read-only copy of replicated state held by an observer
#[derive(Debug, Default)]
pub struct ObserverMirror {
    pub tick: u64,
    pub characters: HashMap<Uuid, CharacterSnapshot>,
    pub controllers: HashMap<Uuid, ControllerSnapshot>,
    /// Latest (weapon, clip, reserve) sent to this observer's owner
    pub ammo: Option<(WeaponKind, u32, u32)>,
}

impl ObserverMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a server message: snapshots replace the mirror, multicasts are presented
    pub fn apply(&mut self, msg: &ServerMsg, presentation: &mut dyn Presentation) {
        match msg {
            ServerMsg::Snapshot {
                tick,
                characters,
                controllers,
                ..
            } => {
                // Snapshots can arrive out of order
                if *tick < self.tick {
                    return;
                }
                self.tick = *tick;
                self.characters = characters.iter().map(|c| (c.character_id, c.clone())).collect();
                self.controllers = controllers.iter().map(|c| (c.user_id, c.clone())).collect();
            }
            ServerMsg::Multicast { event, .. } => self.present(event, presentation),
            ServerMsg::AmmoSync {
                weapon,
                ammo_in_clip,
                remaining_ammo,
                ..
            } => {
                self.ammo = Some((*weapon, *ammo_in_clip, *remaining_ammo));
            }
            _ => {}
        }
    }

    fn present(&mut self, event: &GameEvent, presentation: &mut dyn Presentation) {
        match event {
            GameEvent::CharacterSpawned { position, .. } => {
                presentation.play_effect(EffectId::Spawn, *position);
            }
            GameEvent::WeaponSwapped { character_id, weapon } => {
                for kind in [WeaponKind::Rifle, WeaponKind::RocketLauncher] {
                    presentation.set_weapon_visible(*character_id, kind, kind == *weapon);
                }
            }
            GameEvent::WeaponFired { weapon, muzzle, .. } => {
                presentation.play_effect(EffectId::MuzzleFlash, *muzzle);
                presentation.play_sound(SoundId::WeaponFire(*weapon), *muzzle);
            }
            GameEvent::Impact { location, .. } => {
                presentation.play_effect(EffectId::Impact, *location);
                presentation.play_sound(SoundId::Impact, *location);
            }
            GameEvent::DamageEffect { location, .. } => {
                presentation.play_effect(EffectId::Damage, *location);
            }
            GameEvent::ReloadStarted { character_id, duration } => {
                presentation.play_reload_animation(*character_id, *duration);
            }
            GameEvent::ProjectileImpact { location, .. } => {
                presentation.play_effect(EffectId::Explosion, *location);
                presentation.play_sound(SoundId::Explosion, *location);
            }
            GameEvent::Died { character_id, .. } => {
                let location = self
                    .characters
                    .get(character_id)
                    .map_or(Vec3::ZERO, |c| c.position);
                presentation.play_sound(SoundId::Death, location);
            }
            GameEvent::BodyRemoved { character_id } => presentation.hide_body(*character_id),
            GameEvent::Despawned { character_id } => {
                self.characters.remove(character_id);
                presentation.hide_body(*character_id);
            }
            GameEvent::PropDestroyed { .. }
            | GameEvent::ProjectileSpawned { .. }
            | GameEvent::ProjectileExpired { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        effects: Vec<EffectId>,
        sounds: Vec<SoundId>,
        visible: Vec<(WeaponKind, bool)>,
        reloads: usize,
        hidden: Vec<Uuid>,
    }

    impl Presentation for Recorder {
        fn play_effect(&mut self, effect: EffectId, _location: Vec3) {
            self.effects.push(effect);
        }
        fn play_sound(&mut self, sound: SoundId, _location: Vec3) {
            self.sounds.push(sound);
        }
        fn set_weapon_visible(&mut self, _character_id: Uuid, weapon: WeaponKind, visible: bool) {
            self.visible.push((weapon, visible));
        }
        fn play_reload_animation(&mut self, _character_id: Uuid, _duration: f32) {
            self.reloads += 1;
        }
        fn hide_body(&mut self, character_id: Uuid) {
            self.hidden.push(character_id);
        }
    }

    fn multicast(event: GameEvent) -> ServerMsg {
        ServerMsg::Multicast { tick: 1, event }
    }

    #[tokio::test]
    async fn observer_forwards_numbered_intents_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut endpoint = Endpoint::Observer(ObserverSession::new(tx));
        assert_eq!(endpoint.role(), Role::Observer);

        assert_eq!(endpoint.perform(Action::SprintStart), Ok(1));
        assert_eq!(endpoint.perform(Action::Jump), Ok(2));

        assert_eq!(
            rx.recv().await,
            Some(ClientMsg::Intent {
                seq: 1,
                action: Action::SprintStart
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ClientMsg::Intent {
                seq: 2,
                action: Action::Jump
            })
        );
    }

    #[tokio::test]
    async fn closed_transport_reports_error_and_keeps_sequence() {
        let (tx, rx) = mpsc::channel::<ClientMsg>(1);
        drop(rx);
        let mut session = ObserverSession::new(tx);
        assert_eq!(session.request(Action::Reload), Err(TransportError::Closed));
        assert_eq!(session.next_seq, 1);
    }

    #[tokio::test]
    async fn local_player_inputs_are_marked_local() {
        let (tx, mut rx) = mpsc::channel(4);
        let user_id = Uuid::new_v4();
        let mut endpoint: Endpoint<mpsc::Sender<ClientMsg>> = Endpoint::Authority(LocalPlayer::new(user_id, tx));
        assert_eq!(endpoint.role(), Role::Authority);
        endpoint.perform(Action::FireStart).unwrap();

        let input = rx.recv().await.expect("queued");
        assert_eq!(input.user_id, user_id);
        assert_eq!(input.origin, InputOrigin::Local);
    }

    #[test]
    fn mirror_presents_multicasts_without_touching_state() {
        let mut mirror = ObserverMirror::new();
        let mut recorder = Recorder::default();
        let character_id = Uuid::new_v4();

        mirror.apply(
            &multicast(GameEvent::WeaponSwapped {
                character_id,
                weapon: WeaponKind::RocketLauncher,
            }),
            &mut recorder,
        );
        mirror.apply(
            &multicast(GameEvent::ReloadStarted {
                character_id,
                duration: 2.5,
            }),
            &mut recorder,
        );
        mirror.apply(&multicast(GameEvent::BodyRemoved { character_id }), &mut recorder);

        assert_eq!(
            recorder.visible,
            vec![(WeaponKind::Rifle, false), (WeaponKind::RocketLauncher, true)]
        );
        assert_eq!(recorder.reloads, 1);
        assert_eq!(recorder.hidden, vec![character_id]);
        assert!(mirror.characters.is_empty());
    }

    #[test]
    fn stale_snapshots_are_ignored() {
        let mut mirror = ObserverMirror::new();
        let mut recorder = Recorder::default();
        let snapshot = |tick: u64, controllers: Vec<ControllerSnapshot>| ServerMsg::Snapshot {
            tick,
            characters: Vec::new(),
            controllers,
            props: Vec::new(),
            projectiles: Vec::new(),
        };
        let controller = ControllerSnapshot {
            user_id: Uuid::new_v4(),
            display_name: "Ripley".into(),
            kills: 3,
            deaths: 1,
            character_id: None,
        };

        mirror.apply(&snapshot(10, vec![controller.clone()]), &mut recorder);
        mirror.apply(&snapshot(8, Vec::new()), &mut recorder);
        assert_eq!(mirror.tick, 10);
        assert_eq!(mirror.controllers.get(&controller.user_id), Some(&controller));
        assert!(recorder.effects.is_empty() && recorder.sounds.is_empty());
    }
}
