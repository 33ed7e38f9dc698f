use super::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

fn room_with(n: usize) -> (GameRoom, Vec<PlayerId>) {
    let mut room = GameRoom::new("ABCDEFGH");
    let ids: Vec<PlayerId> = (0..n).map(|_| Uuid::new_v4()).collect();
    for (i, id) in ids.iter().enumerate() {
        room.add_player(*id, format!("p{i}"), 10).unwrap();
    }
    (room, ids)
}

fn started(n: usize) -> (GameRoom, Vec<PlayerId>) {
    let (mut room, ids) = room_with(n);
    room.start(ids[0], "Q1".into()).unwrap();
    (room, ids)
}

/// Writing stage with one answer per player, then voting.
fn voting(n: usize) -> (GameRoom, Vec<PlayerId>) {
    let (mut room, ids) = started(n);
    for (i, id) in ids.iter().enumerate() {
        room.submit_answer(*id, &format!("answer {i}")).unwrap();
    }
    assert_eq!(room.end_writing(&mut rng()), Next::StageTimer);
    (room, ids)
}

fn answer_id_by(room: &GameRoom, author: PlayerId) -> String {
    room.answers
        .iter()
        .find(|a| a.author == author)
        .map(|a| a.id.clone())
        .unwrap()
}

// =============================================================
// Membership
// =============================================================

#[test]
fn room_code_is_eight_uppercase_letters() {
    let code = generate_room_code(&mut rng());
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase()));
}

#[test]
fn new_room_waits_with_no_players() {
    let room = GameRoom::new("ROOM");
    assert_eq!(room.stage(), GameStage::WaitingStage);
    assert!(room.is_empty());
    assert!(room.host().is_none());
}

#[test]
fn host_is_first_joined() {
    let (room, ids) = room_with(3);
    assert_eq!(room.host(), Some(ids[0]));
    let order: Vec<PlayerId> = room.player_ids().collect();
    assert_eq!(order, ids);
}

#[test]
fn add_player_rejects_when_full() {
    let mut room = GameRoom::new("ROOM");
    room.add_player(Uuid::new_v4(), "a", 2).unwrap();
    room.add_player(Uuid::new_v4(), "b", 2).unwrap();
    assert_eq!(room.add_player(Uuid::new_v4(), "c", 2), Err(GameError::RoomFull));
    assert_eq!(room.len(), 2);
}

#[test]
fn host_passes_to_next_player_on_leave() {
    let (mut room, ids) = room_with(3);
    assert_eq!(room.remove_player(ids[0]), Departure::Unchanged);
    assert_eq!(room.host(), Some(ids[1]));
}

// =============================================================
// Start
// =============================================================

#[test]
fn start_requires_host() {
    let (mut room, ids) = room_with(2);
    assert_eq!(room.start(ids[1], "Q".into()), Err(GameError::NotHost));
    assert_eq!(room.stage(), GameStage::WaitingStage);
}

#[test]
fn start_requires_two_players() {
    let (mut room, ids) = room_with(1);
    assert_eq!(room.start(ids[0], "Q".into()), Err(GameError::NotEnoughPlayers));
}

#[test]
fn start_rejected_while_in_progress() {
    let (mut room, ids) = started(2);
    assert_eq!(room.start(ids[0], "Q".into()), Err(GameError::InProgress));
}

#[test]
fn start_enters_writing_and_bumps_epoch() {
    let (mut room, ids) = room_with(2);
    let epoch = room.epoch();
    assert_eq!(room.start(ids[0], "What?".into()), Ok(Next::StageTimer));
    assert_eq!(room.stage(), GameStage::WritingStage);
    assert_eq!(room.question(), "What?");
    assert!(room.epoch() > epoch);
}

// =============================================================
// Writing
// =============================================================

#[test]
fn answer_rejected_outside_writing() {
    let (mut room, ids) = room_with(2);
    assert_eq!(room.submit_answer(ids[0], "hi"), Err(GameError::NotWritingStage));
}

#[test]
fn empty_and_duplicate_answers_are_ignored() {
    let (mut room, ids) = started(3);
    assert_eq!(room.submit_answer(ids[0], ""), Ok(Progress::Pending));
    assert!(!room.seat(ids[0]).unwrap().action_done);

    assert_eq!(room.submit_answer(ids[0], "one"), Ok(Progress::Pending));
    assert_eq!(room.submit_answer(ids[0], "two"), Ok(Progress::Pending));
    assert_eq!(room.snapshot().answers.len(), 1);
    assert!(room.seat(ids[0]).unwrap().action_done);
}

#[test]
fn last_answer_completes_stage() {
    let (mut room, ids) = started(2);
    assert_eq!(room.submit_answer(ids[0], "a"), Ok(Progress::Pending));
    assert_eq!(room.submit_answer(ids[1], "b"), Ok(Progress::StageComplete));
}

#[test]
fn end_writing_without_answers_returns_to_waiting() {
    let (mut room, _) = started(2);
    assert_eq!(room.end_writing(&mut rng()), Next::Idle);
    assert_eq!(room.stage(), GameStage::WaitingStage);
}

#[test]
fn single_answer_is_technical_win() {
    let (mut room, ids) = started(3);
    room.submit_answer(ids[2], "lonely").unwrap();
    assert_eq!(room.end_writing(&mut rng()), Next::WinnerTimer);

    let snap = room.snapshot();
    assert_eq!(snap.game_stage, GameStage::WinnerStage);
    assert_eq!(snap.winner.as_ref().and_then(|w| w.name.as_deref()), Some("p2"));
    assert_eq!(snap.winner.unwrap().score, 1);
    assert_eq!(snap.winner_answer.unwrap().content, "lonely");
}

#[test]
fn end_writing_resets_action_flags() {
    let (room, _) = voting(2);
    assert!(room.snapshot().players.iter().all(|p| !p.action_done));
    assert_eq!(room.stage(), GameStage::VotingStage);
}

// =============================================================
// Voting
// =============================================================

#[test]
fn vote_rejected_outside_voting() {
    let (mut room, ids) = started(2);
    assert_eq!(room.vote(ids[0], "x"), Err(GameError::NotVotingStage));
}

#[test]
fn unknown_answer_and_repeat_votes_are_ignored() {
    let (mut room, ids) = voting(3);
    assert_eq!(room.vote(ids[0], "nope"), Ok(Progress::Pending));
    assert!(!room.seat(ids[0]).unwrap().action_done);

    let target = answer_id_by(&room, ids[1]);
    assert_eq!(room.vote(ids[0], &target), Ok(Progress::Pending));
    assert_eq!(room.vote(ids[0], &target), Ok(Progress::Pending));
    let votes = room.answers.iter().find(|a| a.id == target).unwrap().votes;
    assert_eq!(votes, 1);
}

#[test]
fn most_voted_answer_wins() {
    let (mut room, ids) = voting(3);
    let favorite = answer_id_by(&room, ids[1]);
    let other = answer_id_by(&room, ids[0]);

    room.vote(ids[0], &favorite).unwrap();
    room.vote(ids[2], &favorite).unwrap();
    assert_eq!(room.vote(ids[1], &other), Ok(Progress::StageComplete));

    assert_eq!(room.end_voting(), Next::WinnerTimer);
    let snap = room.snapshot();
    assert_eq!(snap.game_stage, GameStage::WinnerStage);
    assert_eq!(snap.winner.unwrap().name.as_deref(), Some("p1"));
    assert_eq!(snap.winner_answer.unwrap().id, favorite);
    assert_eq!(room.seat(ids[1]).unwrap().score, 1);
    assert_eq!(room.seat(ids[0]).unwrap().score, 0);
}

#[test]
fn tie_goes_to_first_shown_answer() {
    let (mut room, _) = voting(2);
    let first_shown = room.snapshot().answers[0].id.clone();
    room.end_voting();
    assert_eq!(room.snapshot().winner_answer.unwrap().id, first_shown);
}

#[test]
fn winner_who_left_is_not_reported() {
    let (mut room, ids) = voting(3);
    let target = answer_id_by(&room, ids[2]);
    room.vote(ids[0], &target).unwrap();
    room.remove_player(ids[2]);
    room.end_voting();
    let snap = room.snapshot();
    assert!(snap.winner.is_none());
    assert_eq!(snap.winner_answer.unwrap().id, target);
}

// =============================================================
// After winner
// =============================================================

#[test]
fn after_winner_starts_next_round() {
    let (mut room, ids) = started(2);
    room.submit_answer(ids[0], "only").unwrap();
    room.end_writing(&mut rng());

    assert_eq!(room.after_winner(10, "Q2".into()), Next::StageTimer);
    let snap = room.snapshot();
    assert_eq!(snap.game_stage, GameStage::WritingStage);
    assert_eq!(snap.question, "Q2");
    assert!(snap.answers.is_empty());
    assert!(snap.winner.is_none());
    assert_eq!(room.seat(ids[0]).unwrap().score, 1);
}

#[test]
fn reaching_max_score_ends_game() {
    let (mut room, ids) = started(2);
    room.submit_answer(ids[0], "only").unwrap();
    room.end_writing(&mut rng());

    assert_eq!(room.after_winner(1, "Q2".into()), Next::Idle);
    assert_eq!(room.stage(), GameStage::WaitingStage);
    assert!(room.snapshot().players.iter().all(|p| p.score == 0));
}

#[test]
fn transitions_ignore_wrong_stage() {
    let (mut room, _) = room_with(2);
    let epoch = room.epoch();
    assert_eq!(room.end_writing(&mut rng()), Next::Idle);
    assert_eq!(room.end_voting(), Next::Idle);
    assert_eq!(room.after_winner(1, "Q".into()), Next::Idle);
    assert_eq!(room.epoch(), epoch);
}

// =============================================================
// Departures
// =============================================================

#[test]
fn leaving_below_two_players_aborts_game() {
    let (mut room, ids) = started(2);
    assert_eq!(room.remove_player(ids[1]), Departure::Aborted);
    assert_eq!(room.stage(), GameStage::WaitingStage);
}

#[test]
fn leaving_can_complete_the_stage() {
    let (mut room, ids) = started(3);
    room.submit_answer(ids[0], "a").unwrap();
    room.submit_answer(ids[1], "b").unwrap();
    assert_eq!(room.remove_player(ids[2]), Departure::StageComplete);
}

#[test]
fn removing_unknown_player_is_unchanged() {
    let (mut room, _) = started(2);
    assert_eq!(room.remove_player(Uuid::new_v4()), Departure::Unchanged);
    assert_eq!(room.stage(), GameStage::WritingStage);
}

#[test]
fn rejoining_writer_can_answer_again_and_finish_the_stage() {
    let (mut room, ids) = started(3);
    room.submit_answer(ids[1], "first try").unwrap();
    room.submit_answer(ids[2], "other").unwrap();

    assert_eq!(room.remove_player(ids[1]), Departure::Unchanged);
    assert_eq!(room.snapshot().answers.len(), 1);

    room.add_player(ids[1], "p1", 10).unwrap();
    assert!(!room.seat(ids[1]).unwrap().action_done);
    assert_eq!(room.submit_answer(ids[1], "second try"), Ok(Progress::Pending));
    assert_eq!(room.submit_answer(ids[0], "host"), Ok(Progress::StageComplete));

    let contents: Vec<String> = room.snapshot().answers.into_iter().map(|a| a.content).collect();
    assert!(contents.contains(&"second try".to_owned()));
    assert!(!contents.contains(&"first try".to_owned()));
}

#[test]
fn answers_survive_departures_after_writing() {
    let (mut room, ids) = voting(3);
    room.remove_player(ids[2]);
    assert_eq!(room.snapshot().answers.len(), 3);
}
