//! Wire protocol: inbound actions and outbound messages.
//!
//! ARCHITECTURE
//! ============
//! Clients send `{"action": ..., "data": ...}` objects over WebSocket. The
//! payload is always a single string: a name, a token, a room code, answer
//! text, or an answer id. The server replies and broadcasts `ServerMessage`
//! values tagged by `msgType`.
//!
//! DESIGN
//! ======
//! - Service errors implement `ErrorCode`; dispatch turns any of them into
//!   an `error` message with a stable numeric code.
//! - `RoomSnapshot` exposes only public room state. Answer authors and vote
//!   counts never leave the server.

use serde::{Deserialize, Serialize};

use crate::model::{Answer, GameStage, RoomMember};

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable numeric code for structured error messages.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> u16;
}

// =============================================================================
// INBOUND
// =============================================================================

/// Raw inbound envelope. Field names match case-insensitively on the
/// original clients, so the capitalized spellings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Action {
    #[serde(default, alias = "Action")]
    pub action: String,
    #[serde(default, alias = "Data")]
    pub data: String,
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Register(String),
    Login(String),
    CreateRoom,
    JoinRoom(String),
    LeaveRoom,
    StartGame,
    SendAnswer(String),
    VoteAnswer(String),
    SendMessage(String),
}

impl Action {
    /// Map the envelope to a typed action. `None` for unknown or missing
    /// action names.
    #[must_use]
    pub fn into_client_action(self) -> Option<ClientAction> {
        let Self { action, data } = self;
        let parsed = match action.as_str() {
            "register" => ClientAction::Register(data),
            "login" => ClientAction::Login(data),
            "createRoom" => ClientAction::CreateRoom,
            "joinRoom" => ClientAction::JoinRoom(data),
            "leaveRoom" => ClientAction::LeaveRoom,
            "startGame" => ClientAction::StartGame,
            "sendAnswer" => ClientAction::SendAnswer(data),
            "voteAnswer" => ClientAction::VoteAnswer(data),
            "sendMessage" => ClientAction::SendMessage(data),
            _ => return None,
        };
        Some(parsed)
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Public snapshot of a room, broadcast after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_name: String,
    pub players: Vec<RoomMember>,
    pub answers: Vec<Answer>,
    pub game_stage: GameStage,
    pub question: String,
    pub winner: Option<RoomMember>,
    pub winner_answer: Option<Answer>,
}

/// Every message the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// The receiving player's own state. `room` is empty outside a room.
    #[serde(rename = "self")]
    SelfInfo { name: String, room: String, action_done: bool },
    /// Reconnect token issued on registration.
    Session { data: String },
    Chat { author: String, chat_message: String },
    RoomState(RoomSnapshot),
    Status { player_count: usize, room_count: usize },
    Error { error: String, error_code: u16 },
}

/// Author used for server-generated chat notices.
pub const SERVER_AUTHOR: &str = "Server";

impl ServerMessage {
    /// Structured error message from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { error: err.to_string(), error_code: err.error_code() }
    }

    /// Chat notice authored by the server.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Chat { author: SERVER_AUTHOR.to_owned(), chat_message: text.into() }
    }

    /// Wire name of this message, for logging.
    #[must_use]
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::SelfInfo { .. } => "self",
            Self::Session { .. } => "session",
            Self::Chat { .. } => "chat",
            Self::RoomState(_) => "roomState",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
