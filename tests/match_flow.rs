//! End-to-end match flow: queue inputs, tick the authority, read the fan-out

use std::sync::Arc;

use glam::Vec3;
use tokio::sync::broadcast;
use uuid::Uuid;

use shooter_game_server::config::GameplayTuning;
use shooter_game_server::game::world::{Aabb, ArenaWorld};
use shooter_game_server::game::{GameMatch, InputOrigin, MatchHandle, PlayerInput};
use shooter_game_server::replication::protocol::{Action, ClientMsg, GameEvent, ServerMsg};
use shooter_game_server::replication::LocalPlayer;

fn flat_world() -> ArenaWorld {
    let mut world = ArenaWorld::empty(-1_000.0);
    world.add_box(Aabb::new(Vec3::new(-5_000.0, -5_000.0, -10.0), Vec3::new(5_000.0, 5_000.0, 0.0)));
    world.add_spawn_point(Vec3::ZERO);
    world
}

fn new_match(max_players: usize) -> (GameMatch, MatchHandle) {
    GameMatch::new(
        Uuid::new_v4(),
        42,
        max_players,
        Arc::new(GameplayTuning::default()),
        flat_world(),
    )
}

async fn remote(handle: &MatchHandle, user_id: Uuid, msg: ClientMsg) {
    handle
        .input_tx
        .send(PlayerInput {
            user_id,
            msg,
            origin: InputOrigin::Remote,
            received_at: 0,
        })
        .await
        .unwrap();
}

fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn join_is_confirmed_and_replicated() {
    let (mut game_match, handle) = new_match(4);
    let mut rx = handle.subscribe();
    let user_id = Uuid::new_v4();

    remote(&handle, user_id, ClientMsg::Join { name: Some("Vasquez".into()) }).await;
    game_match.tick();

    let msgs = drain(&mut rx);
    let character_id = msgs
        .iter()
        .find_map(|m| match m {
            ServerMsg::Joined {
                user_id: id,
                character_id,
                players,
                ..
            } if *id == user_id => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].display_name, "Vasquez");
                *character_id
            }
            _ => None,
        })
        .expect("joined with a character");

    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMsg::Multicast {
            event: GameEvent::CharacterSpawned { character_id: id, .. },
            ..
        } if *id == character_id
    )));
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMsg::Snapshot { characters, .. } if characters.iter().any(|c| c.character_id == character_id)
    )));
    assert_eq!(handle.player_count(), 1);
}

#[tokio::test]
async fn remote_fire_multicasts_and_syncs_ammo_to_owner() {
    let (mut game_match, handle) = new_match(4);
    let mut rx = handle.subscribe();
    let user_id = Uuid::new_v4();

    remote(&handle, user_id, ClientMsg::Join { name: None }).await;
    game_match.tick();
    drain(&mut rx);

    remote(&handle, user_id, ClientMsg::Intent { seq: 1, action: Action::AimStart }).await;
    remote(&handle, user_id, ClientMsg::Intent { seq: 2, action: Action::FireStart }).await;
    game_match.tick();

    let msgs = drain(&mut rx);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMsg::Multicast {
            event: GameEvent::WeaponFired { .. },
            ..
        }
    )));
    let sync = msgs
        .iter()
        .find(|m| matches!(m, ServerMsg::AmmoSync { .. }))
        .expect("ammo sync");
    assert_eq!(sync.recipient(), Some(user_id));
    if let ServerMsg::AmmoSync { ammo_in_clip, .. } = sync {
        assert_eq!(*ammo_in_clip, 29);
    }
}

#[tokio::test]
async fn local_host_fires_without_ammo_sync() {
    let (mut game_match, handle) = new_match(4);
    let mut rx = handle.subscribe();
    let mut host = LocalPlayer::new(Uuid::new_v4(), handle.input_tx.clone());

    host.send(ClientMsg::Join { name: Some("Host".into()) }).unwrap();
    game_match.tick();
    drain(&mut rx);

    host.request(Action::AimStart).unwrap();
    host.request(Action::FireStart).unwrap();
    game_match.tick();

    let msgs = drain(&mut rx);
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMsg::Multicast {
            event: GameEvent::WeaponFired { .. },
            ..
        }
    )));
    assert!(!msgs.iter().any(|m| matches!(m, ServerMsg::AmmoSync { .. })));
}

#[tokio::test]
async fn full_match_refuses_the_next_player() {
    let (mut game_match, handle) = new_match(1);
    let mut rx = handle.subscribe();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    remote(&handle, first, ClientMsg::Join { name: None }).await;
    remote(&handle, second, ClientMsg::Join { name: None }).await;
    game_match.tick();

    let msgs = drain(&mut rx);
    let refusal = msgs
        .iter()
        .find(|m| matches!(m, ServerMsg::Error { .. }))
        .expect("refused");
    assert_eq!(refusal.recipient(), Some(second));
    assert_eq!(game_match.arena().controllers.len(), 1);
}

#[tokio::test]
async fn leaving_tears_down_the_character() {
    let (mut game_match, handle) = new_match(4);
    let mut rx = handle.subscribe();
    let user_id = Uuid::new_v4();

    remote(&handle, user_id, ClientMsg::Join { name: None }).await;
    game_match.tick();
    remote(&handle, user_id, ClientMsg::Ping { t: 99 }).await;
    remote(&handle, user_id, ClientMsg::Leave).await;
    game_match.tick();

    let msgs = drain(&mut rx);
    assert!(msgs.iter().any(|m| matches!(m, ServerMsg::Pong { t: 99, .. })));
    assert!(msgs.iter().any(|m| matches!(m, ServerMsg::PlayerLeft { user_id: id, .. } if *id == user_id)));
    assert!(msgs.iter().any(|m| matches!(
        m,
        ServerMsg::Multicast {
            event: GameEvent::Despawned { .. },
            ..
        }
    )));
    assert!(game_match.arena().characters.is_empty());
    assert_eq!(handle.player_count(), 0);
}
