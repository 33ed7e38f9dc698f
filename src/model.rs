//! Client-side room model: the state a player's client keeps for one room.
//!
//! DESIGN
//! ======
//! The server owns the authoritative game (`game::room::GameRoom`); clients
//! mirror it through `roomState` snapshots and accumulate chat locally.
//! `Room` is that mirror. Shapes here double as the wire shapes of the
//! public parts of a room (`RoomMember`, `Answer`, `GameStage`).
//!
//! `Room::reset` only clears `name`, `players`, and `messages`. Stage,
//! question, answers, and winner fields survive a reset and are overwritten
//! by the next snapshot.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::protocol::{RoomSnapshot, ServerMessage};

// =============================================================================
// GAME STAGE
// =============================================================================

/// Phase of a round. Serialized as its ordinal (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GameStage {
    #[default]
    WaitingStage,
    WritingStage,
    VotingStage,
    WinnerStage,
}

impl From<GameStage> for u8 {
    fn from(stage: GameStage) -> Self {
        match stage {
            GameStage::WaitingStage => 0,
            GameStage::WritingStage => 1,
            GameStage::VotingStage => 2,
            GameStage::WinnerStage => 3,
        }
    }
}

impl TryFrom<u8> for GameStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::WaitingStage),
            1 => Ok(Self::WritingStage),
            2 => Ok(Self::VotingStage),
            3 => Ok(Self::WinnerStage),
            other => Err(format!("unknown game stage: {other}")),
        }
    }
}

// =============================================================================
// MEMBERS AND ANSWERS
// =============================================================================

/// A participant's per-room state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub score: u32,
    pub action_done: bool,
}

/// One submitted answer. Authorship and votes stay on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub content: String,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// A chat line. Immutable once built; `hash` keys it in UI lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    author: String,
    chat_message: String,
    hash: String,
}

impl Message {
    /// Build a message stamped with the current wall-clock time.
    pub fn new(author: impl Into<String>, chat_message: impl Into<String>) -> Self {
        Self::at(now_ms(), author, chat_message)
    }

    /// Build a message as if created at `ts_ms` milliseconds since the epoch.
    pub fn at(ts_ms: i64, author: impl Into<String>, chat_message: impl Into<String>) -> Self {
        let author = author.into();
        let chat_message = chat_message.into();
        let hash = message_hash(ts_ms, &author, &chat_message);
        Self { author, chat_message, hash }
    }

    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    #[must_use]
    pub fn chat_message(&self) -> &str {
        &self.chat_message
    }

    /// Dedup key. Not a security boundary.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

fn message_hash(ts_ms: i64, author: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ts_ms.to_string().as_bytes());
    hasher.update(author.as_bytes());
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// ROOM
// =============================================================================

/// Client mirror of one game room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Room {
    pub name: Option<String>,
    /// Join order.
    pub players: Vec<RoomMember>,
    /// Chronological.
    pub messages: Vec<Message>,
    pub answers: Option<Vec<Answer>>,
    pub game_stage: Option<GameStage>,
    pub question: Option<String>,
    /// Only meaningful in `WinnerStage`.
    pub winner: Option<RoomMember>,
    /// Only meaningful in `WinnerStage`.
    pub winner_answer: Option<Answer>,
}

impl Room {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear name, players, and chat. Round fields are left as they are.
    pub fn reset(&mut self) {
        self.name = None;
        self.players.clear();
        self.messages.clear();
    }

    /// Fold one server message into the room.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::Chat { author, chat_message } => {
                self.messages.push(Message::new(author.as_str(), chat_message.as_str()));
            }
            ServerMessage::RoomState(snapshot) => self.apply_snapshot(snapshot),
            ServerMessage::SelfInfo { room, .. } if room.is_empty() => self.reset(),
            _ => {}
        }
    }

    fn apply_snapshot(&mut self, snapshot: &RoomSnapshot) {
        self.name = Some(snapshot.room_name.clone());
        self.players.clone_from(&snapshot.players);
        self.answers = Some(snapshot.answers.clone());
        self.game_stage = Some(snapshot.game_stage);
        self.question = Some(snapshot.question.clone());
        self.winner.clone_from(&snapshot.winner);
        self.winner_answer.clone_from(&snapshot.winner_answer);
    }

    /// Host is whoever joined first.
    #[must_use]
    pub fn host(&self) -> Option<&RoomMember> {
        self.players.first()
    }

    /// Whether a winner should be displayed right now.
    #[must_use]
    pub fn is_winner_visible(&self) -> bool {
        self.game_stage == Some(GameStage::WinnerStage) && self.winner.is_some()
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
