//! `GameRoom`: authoritative state of one room and its round machine.
//!
//! DESIGN
//! ======
//! Pure state: no channels, no timers, no locks. Every transition returns a
//! `Next` telling the caller which timer (if any) to arm, and every
//! transition bumps `epoch`. A timer carries the epoch it was armed with and
//! is ignored if the room has moved on since.
//!
//! LIFECYCLE
//! =========
//! Waiting --start--> Writing --end_writing--> Voting --end_voting--> Winner
//! Winner --after_winner--> Writing (next round) | Waiting (game over)
//! Writing with 0 answers falls back to Waiting; with 1 answer it skips
//! voting and awards a technical win.

use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::model::{Answer, GameStage, RoomMember};
use crate::protocol::{ErrorCode, RoomSnapshot};

pub type PlayerId = Uuid;

const ROOM_CODE_LEN: usize = 8;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room is full")]
    RoomFull,
    #[error("Only host is allowed to start games")]
    NotHost,
    #[error("Not enough players")]
    NotEnoughPlayers,
    #[error("Game in progress")]
    InProgress,
    #[error("Not writing stage")]
    NotWritingStage,
    #[error("Not voting stage")]
    NotVotingStage,
}

impl ErrorCode for GameError {
    fn error_code(&self) -> u16 {
        match self {
            Self::RoomFull => 25,
            Self::NotHost => 24,
            Self::NotEnoughPlayers => 26,
            Self::InProgress => 30,
            Self::NotWritingStage => 31,
            Self::NotVotingStage => 32,
        }
    }
}

/// What the caller must schedule after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Nothing to schedule.
    Idle,
    /// Arm the writing/voting stage timer.
    StageTimer,
    /// Arm the winner display timer.
    WinnerTimer,
}

/// Result of a player action within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Accepted or ignored; the stage continues.
    Pending,
    /// Every player has acted; the stage should end now.
    StageComplete,
}

/// Effect of a player leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Unchanged,
    /// Too few players remained; the game fell back to Waiting.
    Aborted,
    /// The remaining players have all acted; the stage should end now.
    StageComplete,
}

/// A player's seat in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub action_done: bool,
}

impl Seat {
    fn member(&self) -> RoomMember {
        RoomMember { name: Some(self.name.clone()), score: self.score, action_done: self.action_done }
    }
}

#[derive(Debug, Clone)]
struct GameAnswer {
    id: String,
    content: String,
    author: PlayerId,
    votes: u32,
}

impl GameAnswer {
    fn public(&self) -> Answer {
        Answer { id: self.id.clone(), content: self.content.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct GameRoom {
    name: String,
    stage: GameStage,
    /// Join order; the first seat is the host.
    seats: Vec<Seat>,
    answers: Vec<GameAnswer>,
    question: String,
    winner: Option<PlayerId>,
    winner_answer: Option<Answer>,
    epoch: u64,
}

/// Random room code of uppercase ASCII letters.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
        .collect()
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

impl GameRoom {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: GameStage::WaitingStage,
            seats: Vec::new(),
            answers: Vec::new(),
            question: String::new(),
            winner: None,
            winner_answer: None,
            epoch: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stage(&self) -> GameStage {
        self.stage
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    #[must_use]
    pub fn seat(&self, id: PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn host(&self) -> Option<PlayerId> {
        self.seats.first().map(|s| s.id)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats.iter().map(|s| s.id)
    }

    /// Seat a player at the end of the join order.
    ///
    /// # Errors
    ///
    /// Returns `GameError::RoomFull` when `capacity` seats are taken.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>, capacity: usize) -> Result<(), GameError> {
        if self.seat(id).is_some() {
            return Ok(());
        }
        if self.seats.len() >= capacity {
            return Err(GameError::RoomFull);
        }
        self.seats
            .push(Seat { id, name: name.into(), score: 0, action_done: false });
        Ok(())
    }

    /// Remove a player's seat and repair the round around the gap.
    ///
    /// An answer written in the current writing stage leaves with its
    /// author, so a player who rejoins can write again.
    pub fn remove_player(&mut self, id: PlayerId) -> Departure {
        let before = self.seats.len();
        self.seats.retain(|s| s.id != id);
        if self.seats.len() == before {
            return Departure::Unchanged;
        }
        if self.stage == GameStage::WritingStage {
            self.answers.retain(|a| a.author != id);
        }

        match self.stage {
            GameStage::WaitingStage => Departure::Unchanged,
            _ if self.seats.len() < 2 => {
                self.abort();
                Departure::Aborted
            }
            GameStage::WritingStage | GameStage::VotingStage if self.all_acted() => Departure::StageComplete,
            _ => Departure::Unchanged,
        }
    }
}

// =============================================================================
// ROUND MACHINE
// =============================================================================

impl GameRoom {
    /// Begin a game. Only the host may start, only from Waiting, and only
    /// with at least two players.
    ///
    /// # Errors
    ///
    /// Returns `InProgress`, `NotHost`, or `NotEnoughPlayers`.
    pub fn start(&mut self, requester: PlayerId, question: String) -> Result<Next, GameError> {
        if self.stage != GameStage::WaitingStage {
            return Err(GameError::InProgress);
        }
        if self.host() != Some(requester) {
            return Err(GameError::NotHost);
        }
        if self.seats.len() < 2 {
            return Err(GameError::NotEnoughPlayers);
        }

        self.reset_scores();
        self.begin_round(question);
        Ok(Next::StageTimer)
    }

    /// Record an answer. Empty text and second answers are ignored.
    ///
    /// # Errors
    ///
    /// Returns `NotWritingStage` outside the writing stage.
    pub fn submit_answer(&mut self, author: PlayerId, content: &str) -> Result<Progress, GameError> {
        if self.stage != GameStage::WritingStage {
            return Err(GameError::NotWritingStage);
        }
        if content.is_empty() || self.answers.iter().any(|a| a.author == author) {
            return Ok(Progress::Pending);
        }
        let Some(seat) = self.seats.iter_mut().find(|s| s.id == author) else {
            return Ok(Progress::Pending);
        };

        seat.action_done = true;
        self.answers.push(GameAnswer {
            id: Uuid::new_v4().simple().to_string(),
            content: content.to_owned(),
            author,
            votes: 0,
        });
        Ok(self.progress())
    }

    /// Record a vote. Repeat votes and unknown answer ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `NotVotingStage` outside the voting stage.
    pub fn vote(&mut self, voter: PlayerId, answer_id: &str) -> Result<Progress, GameError> {
        if self.stage != GameStage::VotingStage {
            return Err(GameError::NotVotingStage);
        }
        let Some(seat) = self.seats.iter_mut().find(|s| s.id == voter) else {
            return Ok(Progress::Pending);
        };
        if seat.action_done {
            return Ok(Progress::Pending);
        }
        let Some(answer) = self.answers.iter_mut().find(|a| a.id == answer_id) else {
            return Ok(Progress::Pending);
        };

        answer.votes += 1;
        seat.action_done = true;
        Ok(self.progress())
    }

    /// Close the writing stage.
    pub fn end_writing<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Next {
        if self.stage != GameStage::WritingStage {
            return Next::Idle;
        }
        self.epoch += 1;
        self.reset_action_flags();

        match self.answers.len() {
            0 => {
                self.stage = GameStage::WaitingStage;
                Next::Idle
            }
            1 => {
                let only = self.answers[0].clone();
                self.declare_winner(&only);
                Next::WinnerTimer
            }
            _ => {
                self.answers.shuffle(rng);
                self.stage = GameStage::VotingStage;
                Next::StageTimer
            }
        }
    }

    /// Close the voting stage. Ties go to the earliest answer in shown order.
    pub fn end_voting(&mut self) -> Next {
        if self.stage != GameStage::VotingStage {
            return Next::Idle;
        }
        self.epoch += 1;
        self.reset_action_flags();

        let mut best: Option<&GameAnswer> = None;
        for answer in &self.answers {
            if best.is_none_or(|b| answer.votes > b.votes) {
                best = Some(answer);
            }
        }
        let Some(best) = best.cloned() else {
            self.stage = GameStage::WaitingStage;
            return Next::Idle;
        };
        self.declare_winner(&best);
        Next::WinnerTimer
    }

    /// Leave the winner stage: next round, or game over once someone
    /// reached `max_score`.
    pub fn after_winner(&mut self, max_score: u32, question: String) -> Next {
        if self.stage != GameStage::WinnerStage {
            return Next::Idle;
        }
        self.reset_action_flags();

        if self.seats.iter().any(|s| s.score >= max_score) {
            self.epoch += 1;
            self.reset_scores();
            self.clear_round();
            self.stage = GameStage::WaitingStage;
            return Next::Idle;
        }

        self.begin_round(question);
        Next::StageTimer
    }

    /// Public snapshot for broadcasting.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_name: self.name.clone(),
            players: self.seats.iter().map(Seat::member).collect(),
            answers: self.answers.iter().map(GameAnswer::public).collect(),
            game_stage: self.stage,
            question: self.question.clone(),
            winner: self
                .winner
                .and_then(|id| self.seat(id))
                .map(Seat::member),
            winner_answer: self.winner_answer.clone(),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

impl GameRoom {
    fn begin_round(&mut self, question: String) {
        self.epoch += 1;
        self.reset_action_flags();
        self.clear_round();
        self.question = question;
        self.stage = GameStage::WritingStage;
    }

    fn declare_winner(&mut self, answer: &GameAnswer) {
        self.winner = None;
        if let Some(seat) = self.seats.iter_mut().find(|s| s.id == answer.author) {
            seat.score += 1;
            self.winner = Some(seat.id);
        }
        self.winner_answer = Some(answer.public());
        self.stage = GameStage::WinnerStage;
    }

    fn abort(&mut self) {
        self.epoch += 1;
        self.reset_action_flags();
        self.clear_round();
        self.stage = GameStage::WaitingStage;
    }

    fn clear_round(&mut self) {
        self.answers.clear();
        self.winner = None;
        self.winner_answer = None;
    }

    fn reset_action_flags(&mut self) {
        for seat in &mut self.seats {
            seat.action_done = false;
        }
    }

    fn reset_scores(&mut self) {
        for seat in &mut self.seats {
            seat.score = 0;
        }
    }

    fn all_acted(&self) -> bool {
        !self.seats.is_empty() && self.seats.iter().all(|s| s.action_done)
    }

    fn progress(&self) -> Progress {
        if self.all_acted() { Progress::StageComplete } else { Progress::Pending }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
