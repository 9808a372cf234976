//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::r#match::MATCH_FULL;
use crate::game::{InputOrigin, PlayerInput};
use crate::replication::protocol::{ClientMsg, ServerMsg};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Requested display name
    #[serde(default)]
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = Uuid::new_v4();
    info!(user_id = %user_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, query.name, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, name: Option<String>, state: AppState) {
    info!(user_id = %user_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        user_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    let handle = state
        .match_registry
        .join_or_create(state.config.max_players_per_match, state.tuning.clone());

    // Subscribe before joining so the join confirmation is not missed
    let snapshot_rx = handle.subscribe();
    let join = PlayerInput {
        user_id,
        msg: ClientMsg::Join { name },
        origin: InputOrigin::Remote,
        received_at: unix_millis(),
    };
    if handle.input_tx.send(join).await.is_err() {
        error!(user_id = %user_id, match_id = %handle.id, "Match closed before join");
        return;
    }

    run_session(user_id, ws_sink, ws_stream, handle.input_tx, snapshot_rx).await;

    info!(user_id = %user_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    user_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    input_tx: mpsc::Sender<PlayerInput>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: match broadcasts addressed to everyone or to us -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if msg.recipient().is_some_and(|to| to != user_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(user_id = %user_id, error = %e, "WebSocket send failed");
                        break;
                    }
                    if is_join_refusal(&msg, user_id) {
                        info!(user_id = %user_id, "Join refused, closing session");
                        let _ = ws_sink.close().await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(user_id = %user_id, lagged_count = n, "Client lagged, skipping messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(user_id = %user_id, "Match channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if let ClientMsg::Join { .. } = client_msg {
                    debug!(user_id = %user_id, "Already joined, ignoring join");
                    continue;
                }
                if !passes_rate_limit(&client_msg, &rate_limiter) {
                    debug!(user_id = %user_id, "Rate limited intent");
                    continue;
                }

                let input = PlayerInput {
                    user_id,
                    msg: client_msg,
                    origin: InputOrigin::Remote,
                    received_at: unix_millis(),
                };
                if input_tx.send(input).await.is_err() {
                    debug!(user_id = %user_id, "Input channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to match loop
    let _ = input_tx
        .send(PlayerInput {
            user_id,
            msg: ClientMsg::Leave,
            origin: InputOrigin::Remote,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Only streamed move/look intents are throttled. Discrete actions such as
/// trigger releases are never resent, so they always go through.
fn passes_rate_limit(msg: &ClientMsg, limiter: &ConnectionRateLimiter) -> bool {
    match msg {
        ClientMsg::Intent { action, .. } if action.is_continuous() => limiter.check_intent(),
        _ => true,
    }
}

/// The match turned this connection away; nothing it sends afterwards can be applied
fn is_join_refusal(msg: &ServerMsg, user_id: Uuid) -> bool {
    matches!(msg, ServerMsg::Error { code, .. } if code == MATCH_FULL) && msg.recipient() == Some(user_id)
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
