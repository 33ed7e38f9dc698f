//! Player service: registration, reconnect, and disconnect grace.
//!
//! ARCHITECTURE
//! ============
//! Registration issues an opaque reconnect token. A dropped socket does not
//! remove the player: they keep their seat for the grace period, and a
//! `login` with the token from a new socket takes over the same player.
//!
//! TRADE-OFFS
//! ==========
//! Tokens live only in memory, so a restart invalidates every session. That
//! matches rooms, which are in-memory too.

use std::fmt::Write;

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::game::room::PlayerId;
use crate::protocol::{ErrorCode, ServerMessage};
use crate::services::room;
use crate::state::{AppState, ClientConn, PlayerEntry};

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Name already taken")]
    NameTaken,
    #[error("Player not registered")]
    NotRegistered,
    #[error("Player already registered")]
    AlreadyRegistered,
    #[error("Name required")]
    NameRequired,
}

impl ErrorCode for PlayerError {
    fn error_code(&self) -> u16 {
        match self {
            Self::InvalidToken => 10,
            Self::NameTaken => 11,
            Self::NotRegistered => 12,
            Self::AlreadyRegistered => 13,
            Self::NameRequired => 14,
        }
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// REGISTER / LOGIN
// =============================================================================

/// Register a new player on this connection. Returns the player id and the
/// replies for the sender (`self`, then `session`).
///
/// # Errors
///
/// Returns `NameRequired` or `NameTaken`.
pub async fn register(
    state: &AppState,
    conn: ClientConn,
    name: &str,
) -> Result<(PlayerId, Vec<ServerMessage>), PlayerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlayerError::NameRequired);
    }

    let mut lobby = state.lobby.write().await;
    if lobby.name_taken(name) {
        return Err(PlayerError::NameTaken);
    }

    let id = Uuid::new_v4();
    let token = generate_token();
    lobby.sessions.insert(token.clone(), id);
    lobby.players.insert(
        id,
        PlayerEntry {
            id,
            name: name.to_owned(),
            room: None,
            token: token.clone(),
            conn: Some(conn),
            disconnect_epoch: 0,
        },
    );
    info!(player_id = %id, player_name = %name, "player registered");

    let own = lobby.self_info(id).ok_or(PlayerError::NotRegistered)?;
    Ok((id, vec![own, ServerMessage::Session { data: token }]))
}

/// Reattach an existing player to a new connection.
///
/// # Errors
///
/// Returns `InvalidToken` for unknown or revoked tokens.
pub async fn login(
    state: &AppState,
    conn: ClientConn,
    token: &str,
) -> Result<(PlayerId, Vec<ServerMessage>), PlayerError> {
    let mut lobby = state.lobby.write().await;
    let id = *lobby.sessions.get(token).ok_or(PlayerError::InvalidToken)?;
    let player = lobby.players.get_mut(&id).ok_or(PlayerError::InvalidToken)?;

    player.conn = Some(conn);
    player.disconnect_epoch += 1;
    let code = player.room.clone();
    info!(player_id = %id, name = %player.name, room = ?code, "player reconnected");

    if let Some(code) = code {
        room::sync_room(&lobby, &code);
    }
    let own = lobby.self_info(id).ok_or(PlayerError::NotRegistered)?;
    Ok((id, vec![own]))
}

// =============================================================================
// DISCONNECT
// =============================================================================

/// Detach a closed connection and start the grace timer.
///
/// No-op if the player has already moved to a newer connection.
pub async fn disconnect(state: &AppState, player_id: PlayerId, conn_id: Uuid) {
    let epoch = {
        let mut lobby = state.lobby.write().await;
        let Some(player) = lobby.players.get_mut(&player_id) else {
            return;
        };
        if player.conn.as_ref().map(|c| c.id) != Some(conn_id) {
            return;
        }
        player.conn = None;
        player.disconnect_epoch += 1;
        info!(%player_id, name = %player.name, "player disconnected, waiting for reconnect");
        player.disconnect_epoch
    };

    let state = state.clone();
    let grace = state.config.disconnect_grace;
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        expire(&state, player_id, epoch).await;
    });
}

/// Forget a player whose grace period ran out. Returns whether the player
/// was removed.
pub(crate) async fn expire(state: &AppState, player_id: PlayerId, epoch: u64) -> bool {
    let mut lobby = state.lobby.write().await;
    let Some(player) = lobby.players.get(&player_id) else {
        return false;
    };
    if player.conn.is_some() || player.disconnect_epoch != epoch {
        return false;
    }

    room::depart(state, &mut lobby, player_id);
    if let Some(player) = lobby.players.remove(&player_id) {
        lobby.sessions.remove(&player.token);
        info!(%player_id, name = %player.name, "player timed out");
    }
    true
}

#[cfg(test)]
#[path = "player_test.rs"]
mod tests;
