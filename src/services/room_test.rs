use super::*;
use crate::config::ServerConfig;
use crate::services::player;
use crate::state::test_helpers::{self, drain};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

async fn registered(state: &AppState, name: &str) -> (PlayerId, mpsc::Receiver<ServerMessage>) {
    let (conn, rx) = test_helpers::test_conn();
    let (id, _) = player::register(state, conn, name).await.unwrap();
    (id, rx)
}

fn last_snapshot(messages: &[ServerMessage]) -> Option<&crate::protocol::RoomSnapshot> {
    messages.iter().rev().find_map(|m| match m {
        ServerMessage::RoomState(s) => Some(s),
        _ => None,
    })
}

// =============================================================
// Create / join
// =============================================================

#[tokio::test]
async fn create_room_seats_creator_and_syncs() {
    let state = test_helpers::test_app_state();
    let (ada, mut rx) = registered(&state, "ada").await;

    let code = create_room(&state, ada).await.unwrap();
    assert_eq!(code.len(), 8);

    let msgs = drain(&mut rx);
    assert_eq!(msgs[0], ServerMessage::notice("Player ada has joined"));
    let snap = last_snapshot(&msgs).unwrap();
    assert_eq!(snap.room_name, code);
    assert_eq!(snap.players.len(), 1);
    assert_eq!(
        msgs.last(),
        Some(&ServerMessage::SelfInfo { name: "ada".into(), room: code.clone(), action_done: false })
    );
}

#[tokio::test]
async fn create_room_twice_is_rejected() {
    let state = test_helpers::test_app_state();
    let (ada, _rx) = registered(&state, "ada").await;
    create_room(&state, ada).await.unwrap();
    assert!(matches!(create_room(&state, ada).await, Err(RoomError::AlreadyInRoom)));
    assert_eq!(state.lobby.read().await.rooms.len(), 1);
}

#[tokio::test]
async fn join_normalizes_code_and_notifies_room() {
    let state = test_helpers::test_app_state();
    let (ada, mut ada_rx) = registered(&state, "ada").await;
    let (bob, _bob_rx) = registered(&state, "bob").await;
    let code = create_room(&state, ada).await.unwrap();
    drain(&mut ada_rx);

    join_room(&state, bob, &format!("  {}  ", code.to_lowercase())).await.unwrap();

    let msgs = drain(&mut ada_rx);
    assert!(msgs.contains(&ServerMessage::notice("Player bob has joined")));
    let names: Vec<_> = last_snapshot(&msgs)
        .unwrap()
        .players
        .iter()
        .map(|p| p.name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, ["ada", "bob"]);
}

#[tokio::test]
async fn join_errors() {
    let state = test_helpers::test_app_state_with(ServerConfig { max_players: 2, ..ServerConfig::default() });
    let (ada, _a) = registered(&state, "ada").await;
    let (bob, _b) = registered(&state, "bob").await;
    let (cy, _c) = registered(&state, "cy").await;

    assert!(matches!(join_room(&state, bob, "NOPENOPE").await, Err(RoomError::NotFound)));

    let code = create_room(&state, ada).await.unwrap();
    join_room(&state, bob, &code).await.unwrap();
    assert!(matches!(join_room(&state, bob, &code).await, Err(RoomError::AlreadyInRoom)));

    let err = join_room(&state, cy, &code).await.unwrap_err();
    assert!(matches!(err, RoomError::Game(GameError::RoomFull)));
    assert_eq!(err.error_code(), 25);
    assert!(state.lobby.read().await.players[&cy].room.is_none());
}

// =============================================================
// Leave
// =============================================================

#[tokio::test]
async fn leave_clears_membership_and_keeps_empty_room() {
    let state = test_helpers::test_app_state();
    let (ada, _rx) = registered(&state, "ada").await;
    let code = create_room(&state, ada).await.unwrap();

    let own = leave_room(&state, ada).await.unwrap();
    assert_eq!(own, ServerMessage::SelfInfo { name: "ada".into(), room: String::new(), action_done: false });

    let lobby = state.lobby.read().await;
    assert!(lobby.players[&ada].room.is_none());
    assert!(lobby.rooms[&code].is_empty());
}

#[tokio::test]
async fn leave_without_room_is_rejected() {
    let state = test_helpers::test_app_state();
    let (ada, _rx) = registered(&state, "ada").await;
    let err = leave_room(&state, ada).await.unwrap_err();
    assert!(matches!(err, RoomError::NotInARoom));
    assert_eq!(err.error_code(), 23);
    assert_eq!(err.to_string(), "Player not in a room");
}

#[tokio::test]
async fn leave_notifies_remaining_players() {
    let state = test_helpers::test_app_state();
    let (ada, _a) = registered(&state, "ada").await;
    let (bob, mut bob_rx) = registered(&state, "bob").await;
    let code = create_room(&state, ada).await.unwrap();
    join_room(&state, bob, &code).await.unwrap();
    drain(&mut bob_rx);

    leave_room(&state, ada).await.unwrap();

    let msgs = drain(&mut bob_rx);
    assert!(msgs.contains(&ServerMessage::notice("Player ada has left")));
    assert_eq!(last_snapshot(&msgs).unwrap().players.len(), 1);
}

#[tokio::test]
async fn leaving_mid_game_with_one_player_left_aborts() {
    let state = test_helpers::test_app_state();
    let (ada, _a) = registered(&state, "ada").await;
    let (bob, mut bob_rx) = registered(&state, "bob").await;
    let code = create_room(&state, ada).await.unwrap();
    join_room(&state, bob, &code).await.unwrap();
    game::start_game(&state, ada).await.unwrap();
    drain(&mut bob_rx);

    leave_room(&state, ada).await.unwrap();

    let msgs = drain(&mut bob_rx);
    assert_eq!(last_snapshot(&msgs).unwrap().game_stage, crate::model::GameStage::WaitingStage);
}

// =============================================================
// Chat
// =============================================================

#[tokio::test]
async fn chat_reaches_everyone_in_room_only() {
    let state = test_helpers::test_app_state();
    let (ada, mut ada_rx) = registered(&state, "ada").await;
    let (bob, mut bob_rx) = registered(&state, "bob").await;
    let (cy, mut cy_rx) = registered(&state, "cy").await;
    let code = create_room(&state, ada).await.unwrap();
    join_room(&state, bob, &code).await.unwrap();
    create_room(&state, cy).await.unwrap();
    drain(&mut ada_rx);
    drain(&mut bob_rx);
    drain(&mut cy_rx);

    send_chat(&state, bob, "hi all").await.unwrap();

    let expected = ServerMessage::Chat { author: "bob".into(), chat_message: "hi all".into() };
    assert_eq!(drain(&mut ada_rx), vec![expected.clone()]);
    assert_eq!(drain(&mut bob_rx), vec![expected]);
    assert!(drain(&mut cy_rx).is_empty());
}

#[tokio::test]
async fn empty_chat_is_ignored_but_requires_room() {
    let state = test_helpers::test_app_state();
    let (ada, mut rx) = registered(&state, "ada").await;
    assert!(matches!(send_chat(&state, ada, "hi").await, Err(RoomError::NotInRoom)));

    create_room(&state, ada).await.unwrap();
    drain(&mut rx);
    send_chat(&state, ada, "").await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

// =============================================================
// Housekeeping
// =============================================================

#[tokio::test]
async fn gc_removes_only_empty_rooms() {
    let state = test_helpers::test_app_state();
    let (ada, _a) = registered(&state, "ada").await;
    let (bob, _b) = registered(&state, "bob").await;
    let kept = create_room(&state, ada).await.unwrap();
    let dropped = create_room(&state, bob).await.unwrap();
    leave_room(&state, bob).await.unwrap();

    assert_eq!(collect_empty_rooms(&state).await, 1);
    let lobby = state.lobby.read().await;
    assert!(lobby.rooms.contains_key(&kept));
    assert!(!lobby.rooms.contains_key(&dropped));
}

#[tokio::test]
async fn status_counts_players_and_rooms() {
    let state = test_helpers::test_app_state();
    let (ada, _a) = registered(&state, "ada").await;
    registered(&state, "bob").await;
    create_room(&state, ada).await.unwrap();

    assert_eq!(status_message(&state).await, ServerMessage::Status { player_count: 2, room_count: 1 });
}

#[tokio::test]
async fn status_goes_to_every_connection() {
    let state = test_helpers::test_app_state();
    let (tx, mut rx) = mpsc::channel(8);
    state.connections.write().await.insert(uuid::Uuid::new_v4(), tx);

    broadcast_status(&state).await;

    let msg = timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("status receive timed out");
    assert_eq!(msg, Some(ServerMessage::Status { player_count: 0, room_count: 0 }));
}
