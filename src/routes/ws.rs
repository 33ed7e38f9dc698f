//! WebSocket handler: one connection, one player.
//!
//! DESIGN
//! ======
//! On upgrade, registers the connection and enters a `select!` loop:
//! - Incoming client actions → rate limit → parse → dispatch
//! - Room broadcasts queued by services → forward to client
//!
//! Handlers return an `Outcome` (or an error message). Direct replies are
//! written straight to the socket; anything meant for the whole room goes
//! through the services, which queue it on every member's channel.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → connection registered for status broadcasts
//! 2. `register` or `login` binds a player to the connection
//! 3. Game actions → dispatch → Outcome → replies
//! 4. Close or invalid JSON → unregister → player disconnect grace

use std::net::{IpAddr, SocketAddr};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::room::PlayerId;
use crate::protocol::{Action, ClientAction, ServerMessage};
use crate::services;
use crate::services::player::PlayerError;
use crate::state::{AppState, ClientConn};

const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions.
#[derive(Debug)]
enum Outcome {
    /// Send these messages to the sender only.
    Reply(Vec<ServerMessage>),
    /// Nothing for the sender beyond what services broadcast.
    Done,
}

/// Inbound text that is not a JSON action. The connection is closed.
#[derive(Debug)]
struct MalformedAction(serde_json::Error);

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let addr = client_addr(&headers, peer);
    ws.on_upgrade(move |socket| run_ws(socket, state, addr))
}

/// Client address for rate limiting: first `X-Forwarded-For` hop, else peer.
fn client_addr(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| peer.ip())
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, addr: IpAddr) {
    let conn_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_CAPACITY);
    state
        .connections
        .write()
        .await
        .insert(conn_id, client_tx.clone());
    info!(%conn_id, %addr, "ws: connection opened");

    let conn = ClientConn { id: conn_id, tx: client_tx };
    let mut player: Option<PlayerId> = None;

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Err(e) = state.rate_limiter.check_and_record(addr) {
                            warn!(%conn_id, %addr, error = %e, "ws: message dropped");
                            continue;
                        }
                        let replies = match process_inbound_text(&state, &conn, &mut player, text.as_str()).await {
                            Ok(replies) => replies,
                            Err(MalformedAction(e)) => {
                                warn!(%conn_id, error = %e, "ws: invalid inbound action, closing");
                                break;
                            }
                        };
                        for reply in &replies {
                            if send_message(&mut socket, reply).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(out) = client_rx.recv() => {
                if send_message(&mut socket, &out).await.is_err() {
                    break;
                }
            }
        }
    }

    state.connections.write().await.remove(&conn_id);
    if let Some(player_id) = player {
        services::player::disconnect(&state, player_id, conn_id).await;
    }
    info!(%conn_id, "ws: connection closed");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and process one inbound text message and return replies for the
/// sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(
    state: &AppState,
    conn: &ClientConn,
    player: &mut Option<PlayerId>,
    text: &str,
) -> Result<Vec<ServerMessage>, MalformedAction> {
    let action: Action = serde_json::from_str(text).map_err(MalformedAction)?;
    debug!(conn_id = %conn.id, action = %action.action, "ws: recv action");

    let Some(action) = action.into_client_action() else {
        debug!(conn_id = %conn.id, "ws: unknown action ignored");
        return Ok(Vec::new());
    };

    let result = dispatch(state, conn, player, action).await;
    Ok(match result {
        Ok(Outcome::Reply(replies)) => replies,
        Ok(Outcome::Done) => Vec::new(),
        Err(err) => vec![err],
    })
}

async fn dispatch(
    state: &AppState,
    conn: &ClientConn,
    player: &mut Option<PlayerId>,
    action: ClientAction,
) -> Result<Outcome, ServerMessage> {
    match action {
        ClientAction::Register(name) => {
            if player.is_some() {
                return Err(ServerMessage::error_from(&PlayerError::AlreadyRegistered));
            }
            let (id, replies) = services::player::register(state, conn.clone(), &name)
                .await
                .map_err(|e| ServerMessage::error_from(&e))?;
            *player = Some(id);
            Ok(Outcome::Reply(replies))
        }
        ClientAction::Login(token) => {
            let (id, replies) = services::player::login(state, conn.clone(), &token)
                .await
                .map_err(|e| ServerMessage::error_from(&e))?;
            if let Some(previous) = player.replace(id) {
                if previous != id {
                    services::player::disconnect(state, previous, conn.id).await;
                }
            }
            Ok(Outcome::Reply(replies))
        }
        other => {
            let Some(player_id) = *player else {
                return Err(ServerMessage::error_from(&PlayerError::NotRegistered));
            };
            if !owns_player(state, player_id, conn.id).await {
                debug!(conn_id = %conn.id, %player_id, "ws: player moved to another connection");
                *player = None;
                return Err(ServerMessage::error_from(&PlayerError::NotRegistered));
            }
            handle_player_action(state, player_id, other)
                .await
                .map_err(|e| ServerMessage::error_from(&e))
        }
    }
}

/// Whether the player's live connection is still this one. A `login` from
/// another socket takes the player over.
async fn owns_player(state: &AppState, player_id: PlayerId, conn_id: Uuid) -> bool {
    let lobby = state.lobby.read().await;
    lobby
        .players
        .get(&player_id)
        .and_then(|p| p.conn.as_ref())
        .is_some_and(|c| c.id == conn_id)
}

async fn handle_player_action(
    state: &AppState,
    player_id: PlayerId,
    action: ClientAction,
) -> Result<Outcome, services::room::RoomError> {
    match action {
        ClientAction::CreateRoom => {
            services::room::create_room(state, player_id).await?;
            Ok(Outcome::Done)
        }
        ClientAction::JoinRoom(code) => {
            services::room::join_room(state, player_id, &code).await?;
            Ok(Outcome::Done)
        }
        ClientAction::LeaveRoom => {
            let own = services::room::leave_room(state, player_id).await?;
            Ok(Outcome::Reply(vec![own]))
        }
        ClientAction::StartGame => {
            services::game::start_game(state, player_id).await?;
            Ok(Outcome::Done)
        }
        ClientAction::SendAnswer(content) => {
            services::game::send_answer(state, player_id, &content).await?;
            Ok(Outcome::Done)
        }
        ClientAction::VoteAnswer(answer_id) => {
            services::game::vote_answer(state, player_id, &answer_id).await?;
            Ok(Outcome::Done)
        }
        ClientAction::SendMessage(text) => {
            services::room::send_chat(state, player_id, &text).await?;
            Ok(Outcome::Done)
        }
        ClientAction::Register(_) | ClientAction::Login(_) => Ok(Outcome::Done),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    if let ServerMessage::Error { error, error_code } = message {
        warn!(error_code, error = %error, "ws: send error");
    } else {
        debug!(msg_type = message.msg_type(), "ws: send message");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
