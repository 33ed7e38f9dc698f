//! Room service: create/join/leave, chat, and room-wide delivery.
//!
//! DESIGN
//! ======
//! Every room mutation ends with `sync_room`, which sends the public
//! snapshot plus each player's own `self` message. Clients never have to
//! merge partial updates.
//!
//! Empty rooms are not removed on leave. The garbage collector sweeps them
//! periodically so a host can briefly drop and come back to the same code.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::game::room::{Departure, GameError, GameRoom, PlayerId, generate_room_code};
use crate::protocol::{ErrorCode, ServerMessage};
use crate::services::game;
use crate::state::{AppState, Lobby};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Player not in room")]
    NotInRoom,
    #[error("Player not in a room")]
    NotInARoom,
    #[error("Player already in a room")]
    AlreadyInRoom,
    #[error("Player not registered")]
    UnknownPlayer,
    #[error(transparent)]
    Game(#[from] GameError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> u16 {
        match self {
            Self::NotFound => 20,
            Self::NotInRoom => 21,
            Self::NotInARoom => 23,
            Self::AlreadyInRoom => 22,
            Self::UnknownPlayer => 12,
            Self::Game(e) => e.error_code(),
        }
    }
}

// =============================================================================
// CREATE / JOIN / LEAVE
// =============================================================================

/// Create a room with a fresh code and seat the creator in it.
///
/// # Errors
///
/// Returns `AlreadyInRoom` if the player sits in another room.
pub async fn create_room(state: &AppState, player_id: PlayerId) -> Result<String, RoomError> {
    let mut lobby = state.lobby.write().await;
    ensure_roomless(&lobby, player_id)?;

    let code = loop {
        let candidate = generate_room_code(&mut rand::rng());
        if !lobby.rooms.contains_key(&candidate) {
            break candidate;
        }
    };
    lobby.rooms.insert(code.clone(), GameRoom::new(code.clone()));
    info!(room = %code, %player_id, "room created");

    seat_player(state, &mut lobby, player_id, &code)?;
    Ok(code)
}

/// Join an existing room by code.
///
/// # Errors
///
/// Returns `AlreadyInRoom`, `NotFound`, or `Game(RoomFull)`.
pub async fn join_room(state: &AppState, player_id: PlayerId, code: &str) -> Result<(), RoomError> {
    let mut lobby = state.lobby.write().await;
    ensure_roomless(&lobby, player_id)?;
    let code = code.trim().to_ascii_uppercase();
    if !lobby.rooms.contains_key(&code) {
        return Err(RoomError::NotFound);
    }
    seat_player(state, &mut lobby, player_id, &code)
}

/// Leave the current room. Returns the player's updated `self` message.
///
/// # Errors
///
/// Returns `NotInARoom` if the player is not seated anywhere.
pub async fn leave_room(state: &AppState, player_id: PlayerId) -> Result<ServerMessage, RoomError> {
    let mut lobby = state.lobby.write().await;
    if depart(state, &mut lobby, player_id).is_none() {
        return Err(RoomError::NotInARoom);
    }
    lobby.self_info(player_id).ok_or(RoomError::UnknownPlayer)
}

/// Broadcast a chat line from a player to their room. Empty text is ignored.
///
/// Chat does not resync the room: nothing in the room changed, and clients
/// append chat lines on their own.
///
/// # Errors
///
/// Returns `NotInRoom` if the player is not seated anywhere.
pub async fn send_chat(state: &AppState, player_id: PlayerId, text: &str) -> Result<(), RoomError> {
    let lobby = state.lobby.read().await;
    let player = lobby.players.get(&player_id).ok_or(RoomError::UnknownPlayer)?;
    let code = player.room.as_deref().ok_or(RoomError::NotInRoom)?;
    if text.is_empty() {
        return Ok(());
    }
    broadcast(&lobby, code, &ServerMessage::Chat { author: player.name.clone(), chat_message: text.to_owned() });
    Ok(())
}

/// Remove a player from their room and repair the round. Returns the room
/// code, or `None` if the player was not seated.
pub(crate) fn depart(state: &AppState, lobby: &mut Lobby, player_id: PlayerId) -> Option<String> {
    let player = lobby.players.get_mut(&player_id)?;
    let code = player.room.take()?;
    let name = player.name.clone();

    let Some(room) = lobby.rooms.get_mut(&code) else {
        warn!(room = %code, %player_id, "player pointed at a missing room");
        return None;
    };
    let departure = room.remove_player(player_id);
    info!(room = %code, %player_id, remaining = room.len(), ?departure, "player left room");

    if departure == Departure::StageComplete {
        game::finish_stage(state, lobby, &code);
    }
    broadcast(lobby, &code, &ServerMessage::notice(format!("Player {name} has left")));
    sync_room(lobby, &code);
    Some(code)
}

fn ensure_roomless(lobby: &Lobby, player_id: PlayerId) -> Result<(), RoomError> {
    let player = lobby.players.get(&player_id).ok_or(RoomError::UnknownPlayer)?;
    if player.room.is_some() {
        return Err(RoomError::AlreadyInRoom);
    }
    Ok(())
}

fn seat_player(state: &AppState, lobby: &mut Lobby, player_id: PlayerId, code: &str) -> Result<(), RoomError> {
    let name = lobby
        .players
        .get(&player_id)
        .map(|p| p.name.clone())
        .ok_or(RoomError::UnknownPlayer)?;
    let room = lobby.rooms.get_mut(code).ok_or(RoomError::NotFound)?;
    room.add_player(player_id, name.as_str(), state.config.max_players)?;
    info!(room = %code, %player_id, players = room.len(), "player joined room");

    if let Some(player) = lobby.players.get_mut(&player_id) {
        player.room = Some(code.to_owned());
    }
    broadcast(lobby, code, &ServerMessage::notice(format!("Player {name} has joined")));
    sync_room(lobby, code);
    Ok(())
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Send a message to every player seated in a room.
pub fn broadcast(lobby: &Lobby, code: &str, message: &ServerMessage) {
    let Some(room) = lobby.rooms.get(code) else {
        return;
    };
    for player_id in room.player_ids() {
        lobby.send_to(player_id, message.clone());
    }
}

/// Send the room snapshot and each player's `self` message.
pub fn sync_room(lobby: &Lobby, code: &str) {
    let Some(room) = lobby.rooms.get(code) else {
        return;
    };
    let snapshot = ServerMessage::RoomState(room.snapshot());
    for player_id in room.player_ids() {
        lobby.send_to(player_id, snapshot.clone());
        if let Some(own) = lobby.self_info(player_id) {
            lobby.send_to(player_id, own);
        }
    }
}

// =============================================================================
// HOUSEKEEPING
// =============================================================================

/// Remove rooms nobody sits in. Returns how many were removed.
pub async fn collect_empty_rooms(state: &AppState) -> usize {
    let mut lobby = state.lobby.write().await;
    let before = lobby.rooms.len();
    lobby.rooms.retain(|_, room| !room.is_empty());
    before - lobby.rooms.len()
}

/// Spawn the periodic empty-room sweeper.
pub fn spawn_room_gc(state: AppState) -> JoinHandle<()> {
    let interval = state.config.room_gc_interval;
    info!(interval_secs = interval.as_secs(), "room garbage collector configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let count = collect_empty_rooms(&state).await;
            if count > 0 {
                info!(count, "cleaned up empty rooms");
            }
            state.rate_limiter.prune_idle();
        }
    })
}

/// Current player and room counts.
pub async fn status_message(state: &AppState) -> ServerMessage {
    let lobby = state.lobby.read().await;
    ServerMessage::Status { player_count: lobby.players.len(), room_count: lobby.rooms.len() }
}

/// Send the status message to every open connection.
pub async fn broadcast_status(state: &AppState) {
    let status = status_message(state).await;
    let connections = state.connections.read().await;
    for tx in connections.values() {
        let _ = tx.try_send(status.clone());
    }
}

/// Spawn the periodic status broadcaster.
pub fn spawn_status_broadcaster(state: AppState) -> JoinHandle<()> {
    let interval: Duration = state.config.status_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            broadcast_status(&state).await;
        }
    })
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
