//! Game service: starting games, answers, votes, and stage timers.
//!
//! DESIGN
//! ======
//! `GameRoom` decides transitions; this module wires them to the clock.
//! A stage ends either when every player has acted or when its timer
//! fires, whichever comes first. Timers are fire-and-forget tasks that
//! re-check the room's epoch under the lobby lock, so an early finish
//! simply leaves the old timer to expire as a no-op.

use std::time::Duration;

use tracing::{debug, info};

use crate::game::room::{GameRoom, Next, PlayerId, Progress};
use crate::model::GameStage;
use crate::services::room::{self, RoomError};
use crate::state::{AppState, Lobby};

// =============================================================================
// PLAYER ACTIONS
// =============================================================================

/// Start a game in the player's room. Host only.
///
/// # Errors
///
/// Returns `NotInRoom`, or the room's `InProgress` / `NotHost` /
/// `NotEnoughPlayers`.
pub async fn start_game(state: &AppState, player_id: PlayerId) -> Result<(), RoomError> {
    let mut lobby = state.lobby.write().await;
    let code = seated_room(&lobby, player_id)?;
    let question = state.questions.draw();

    let room = room_mut(&mut lobby, &code)?;
    let next = room.start(player_id, question)?;
    let epoch = room.epoch();
    info!(room = %code, %player_id, players = room.len(), "game started");

    arm(state, &code, epoch, next);
    room::sync_room(&lobby, &code);
    Ok(())
}

/// Submit the player's answer for the current round.
///
/// # Errors
///
/// Returns `NotInRoom` or `Game(NotWritingStage)`.
pub async fn send_answer(state: &AppState, player_id: PlayerId, content: &str) -> Result<(), RoomError> {
    let mut lobby = state.lobby.write().await;
    let code = seated_room(&lobby, player_id)?;

    let progress = room_mut(&mut lobby, &code)?.submit_answer(player_id, content)?;
    if progress == Progress::StageComplete {
        info!(room = %code, "all players finished writing");
        finish_stage(state, &mut lobby, &code);
    }
    room::sync_room(&lobby, &code);
    Ok(())
}

/// Vote for an answer in the current round.
///
/// # Errors
///
/// Returns `NotInRoom` or `Game(NotVotingStage)`.
pub async fn vote_answer(state: &AppState, player_id: PlayerId, answer_id: &str) -> Result<(), RoomError> {
    let mut lobby = state.lobby.write().await;
    let code = seated_room(&lobby, player_id)?;

    let progress = room_mut(&mut lobby, &code)?.vote(player_id, answer_id)?;
    if progress == Progress::StageComplete {
        info!(room = %code, "all players finished voting");
        finish_stage(state, &mut lobby, &code);
    }
    room::sync_room(&lobby, &code);
    Ok(())
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// End the room's current stage and arm whatever comes next.
///
/// The caller holds the lobby lock and is responsible for syncing the room.
pub(crate) fn finish_stage(state: &AppState, lobby: &mut Lobby, code: &str) {
    let Some(room) = lobby.rooms.get_mut(code) else {
        return;
    };
    let next = match room.stage() {
        GameStage::WritingStage => room.end_writing(&mut rand::rng()),
        GameStage::VotingStage => room.end_voting(),
        GameStage::WinnerStage => room.after_winner(state.config.max_score, state.questions.draw()),
        GameStage::WaitingStage => Next::Idle,
    };
    info!(room = %code, stage = ?room.stage(), ?next, "stage finished");
    arm(state, code, room.epoch(), next);
}

/// Spawn the timer for `next`, tagged with the room epoch it belongs to.
fn arm(state: &AppState, code: &str, epoch: u64, next: Next) {
    let delay: Duration = match next {
        Next::Idle => return,
        Next::StageTimer => state.config.stage_timeout,
        Next::WinnerTimer => state.config.winner_timeout,
    };
    let state = state.clone();
    let code = code.to_owned();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        on_timer(&state, &code, epoch).await;
    });
}

/// Timer callback. Returns whether the timer still applied.
pub(crate) async fn on_timer(state: &AppState, code: &str, epoch: u64) -> bool {
    let mut lobby = state.lobby.write().await;
    let Some(room) = lobby.rooms.get(code) else {
        return false;
    };
    if room.epoch() != epoch {
        debug!(room = %code, epoch, current = room.epoch(), "stale stage timer ignored");
        return false;
    }
    info!(room = %code, stage = ?room.stage(), "stage timeout");
    finish_stage(state, &mut lobby, code);
    room::sync_room(&lobby, code);
    true
}

// =============================================================================
// HELPERS
// =============================================================================

fn seated_room(lobby: &Lobby, player_id: PlayerId) -> Result<String, RoomError> {
    let player = lobby.players.get(&player_id).ok_or(RoomError::UnknownPlayer)?;
    player.room.clone().ok_or(RoomError::NotInRoom)
}

fn room_mut<'a>(lobby: &'a mut Lobby, code: &str) -> Result<&'a mut GameRoom, RoomError> {
    lobby.rooms.get_mut(code).ok_or(RoomError::NotFound)
}

#[cfg(test)]
#[path = "game_test.rs"]
mod tests;
