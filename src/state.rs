//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! cloned into every background task. Players, sessions, and rooms live
//! together in one `Lobby` behind a single lock: most operations touch a
//! room and the connections of its players at once, and one lock keeps
//! that free of ordering rules.
//!
//! Outbound delivery is never awaited under the lock. Each connection owns
//! a bounded channel and broadcasts use `try_send`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::questions::QuestionDeck;
use crate::game::room::{GameRoom, PlayerId};
use crate::protocol::ServerMessage;
use crate::rate_limit::RateLimiter;

// =============================================================================
// PLAYER
// =============================================================================

/// A live WebSocket connection attached to a player.
#[derive(Debug, Clone)]
pub struct ClientConn {
    pub id: Uuid,
    pub tx: mpsc::Sender<ServerMessage>,
}

/// Server-side record of a registered player.
#[derive(Debug)]
pub struct PlayerEntry {
    pub id: PlayerId,
    pub name: String,
    /// Code of the room the player sits in.
    pub room: Option<String>,
    /// Reconnect token.
    pub token: String,
    /// `None` while the player is within the disconnect grace period.
    pub conn: Option<ClientConn>,
    /// Bumped on every disconnect and login so stale grace timers no-op.
    pub disconnect_epoch: u64,
}

// =============================================================================
// LOBBY
// =============================================================================

/// Everything guarded by the lobby lock.
#[derive(Debug, Default)]
pub struct Lobby {
    pub players: HashMap<PlayerId, PlayerEntry>,
    /// Reconnect token -> player.
    pub sessions: HashMap<String, PlayerId>,
    /// Room code -> room.
    pub rooms: HashMap<String, GameRoom>,
}

impl Lobby {
    /// Queue a message for a player's live connection. Best-effort: a
    /// disconnected player or a full channel drops the message.
    pub fn send_to(&self, player_id: PlayerId, message: ServerMessage) -> bool {
        let Some(conn) = self.players.get(&player_id).and_then(|p| p.conn.as_ref()) else {
            return false;
        };
        conn.tx.try_send(message).is_ok()
    }

    /// The `self` message describing a player's own state.
    #[must_use]
    pub fn self_info(&self, player_id: PlayerId) -> Option<ServerMessage> {
        let player = self.players.get(&player_id)?;
        let room = player.room.as_deref().unwrap_or_default();
        let action_done = player
            .room
            .as_ref()
            .and_then(|code| self.rooms.get(code))
            .and_then(|r| r.seat(player_id))
            .is_some_and(|s| s.action_done);
        Some(ServerMessage::SelfInfo { name: player.name.clone(), room: room.to_owned(), action_done })
    }

    #[must_use]
    pub fn name_taken(&self, name: &str) -> bool {
        self.players.values().any(|p| p.name == name)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub lobby: Arc<RwLock<Lobby>>,
    /// Every open connection, registered or not, for status broadcasts.
    pub connections: Arc<RwLock<HashMap<Uuid, mpsc::Sender<ServerMessage>>>>,
    pub questions: Arc<QuestionDeck>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig, questions: QuestionDeck) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit);
        Self {
            config: Arc::new(config),
            lobby: Arc::new(RwLock::new(Lobby::default())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            questions: Arc::new(questions),
            rate_limiter,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
