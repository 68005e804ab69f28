use potluck::protocol::{ClientMessage, ServerMessage};
use potluck::state::AppState;
use potluck::types::{RoomConfig, RoomPhase, VoteMode};
use potluck::ws;
use potluck::ws::handlers::handle_message;
use std::sync::Arc;

/// Create a room and return (code, host player id).
async fn create(state: &Arc<AppState>, conn: &str, name: &str) -> (String, String) {
    let dispatch = handle_message(
        state,
        conn,
        ClientMessage::CreateRoom {
            name: name.to_string(),
        },
    )
    .await;
    match dispatch.reply {
        Some(ServerMessage::RoomCreated { room }) => {
            let host = room.players[0].clone();
            assert!(host.is_host);
            (room.code, host.id)
        }
        other => panic!("Expected RoomCreated, got {other:?}"),
    }
}

/// Join a room and return the joining player's id.
async fn join(state: &Arc<AppState>, conn: &str, code: &str, name: &str) -> String {
    let dispatch = handle_message(
        state,
        conn,
        ClientMessage::JoinRoom {
            room_code: code.to_string(),
            name: name.to_string(),
        },
    )
    .await;
    match dispatch.reply {
        Some(ServerMessage::RoomJoined { room }) => room
            .players
            .iter()
            .find(|p| p.name == name)
            .expect("joined player should be in snapshot")
            .id
            .clone(),
        other => panic!("Expected RoomJoined, got {other:?}"),
    }
}

async fn submit(state: &Arc<AppState>, conn: &str, code: &str, content: &str) {
    let dispatch = handle_message(
        state,
        conn,
        ClientMessage::SubmitContent {
            room_code: code.to_string(),
            content: Some(content.to_string()),
            image_base64: None,
        },
    )
    .await;
    assert!(
        matches!(dispatch.reply, Some(ServerMessage::SubmissionConfirmed { .. })),
        "submission should be confirmed"
    );
}

async fn phase_of(state: &Arc<AppState>, code: &str) -> RoomPhase {
    let handle = state.find_room(code).await.expect("room should exist");
    let room = handle.room.lock().await;
    room.phase
}

async fn submission_id_of(state: &Arc<AppState>, code: &str, player_id: &str) -> String {
    let handle = state.find_room(code).await.expect("room should exist");
    let room = handle.room.lock().await;
    room.submission_by_player(player_id)
        .expect("player should have a submission")
        .id
        .clone()
}

fn error_code(dispatch: &potluck::ws::handlers::Dispatch) -> &str {
    match &dispatch.reply {
        Some(ServerMessage::Error { code, .. }) => code,
        other => panic!("Expected Error reply, got {other:?}"),
    }
}

/// End-to-end flow: lobby, submissions, votes, results, back to lobby.
#[tokio::test]
async fn test_full_game_flow() {
    let state = Arc::new(AppState::new());
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);
    {
        let handle = state.find_room(&code).await.unwrap();
        let room = handle.room.lock().await;
        assert_eq!(room.round, 1);
        assert!(room.prompt.is_some());
        assert!(room.phase_deadline.is_some());
    }

    submit(&state, "conn-a", &code, "https://img/alice").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);
    submit(&state, "conn-b", &code, "https://img/bob").await;
    // Everyone submitted, so the room advanced on its own.
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    let alice_dish = submission_id_of(&state, &code, &alice).await;
    let bob_dish = submission_id_of(&state, &code, &bob).await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish,
            value: None,
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    handle_message(
        &state,
        "conn-b",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: alice_dish,
            value: None,
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Results);

    handle_message(
        &state,
        "conn-a",
        ClientMessage::ResetToLobby {
            room_code: code.clone(),
        },
    )
    .await;
    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert_eq!(room.phase, RoomPhase::Lobby);
    assert!(room.submissions.is_empty());
    assert!(room.prompt.is_none());
    assert_eq!(room.round, 1);
}

#[tokio::test]
async fn test_non_host_cannot_start() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    let dispatch = handle_message(
        &state,
        "conn-b",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "NOT_HOST");
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Lobby);
}

#[tokio::test]
async fn test_host_forces_voting_with_partial_submissions() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;
    join(&state, "conn-c", &code, "Carol").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartVoting {
            room_code: code.clone(),
        },
    )
    .await;
    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert_eq!(room.phase, RoomPhase::Voting);
    assert_eq!(room.submitted_count(), 2);
}

#[tokio::test]
async fn test_tie_breaks_by_earlier_submission() {
    let state = Arc::new(AppState::new());
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;

    // Pin the timestamps so the tie-break is deterministic.
    {
        let handle = state.find_room(&code).await.unwrap();
        let mut room = handle.room.lock().await;
        let bob_dish = room.submission_by_player(&bob).unwrap().id.clone();
        let alice_dish = room.submission_by_player(&alice).unwrap().id.clone();
        if let Some(s) = room.submissions.get_mut(&bob_dish) {
            s.created_at = "2026-01-01T00:00:00Z".to_string();
        }
        if let Some(s) = room.submissions.get_mut(&alice_dish) {
            s.created_at = "2026-01-01T00:00:05Z".to_string();
        }
    }

    let alice_dish = submission_id_of(&state, &code, &alice).await;
    let bob_dish = submission_id_of(&state, &code, &bob).await;
    handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish.clone(),
            value: None,
        },
    )
    .await;

    let mut results = None;
    let mut rx = {
        let handle = state.find_room(&code).await.unwrap();
        handle.subscribe()
    };
    handle_message(
        &state,
        "conn-b",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: alice_dish,
            value: None,
        },
    )
    .await;
    while let Ok(msg) = rx.try_recv() {
        if let ServerMessage::ResultsReady { winner, .. } = msg {
            results = Some(winner);
        }
    }

    // Both scored 1; Bob's earlier submission wins the tie.
    let winner = results.expect("results should be broadcast").expect("winner");
    assert_eq!(winner.submission_id, bob_dish);
    assert_eq!(winner.score, 1);
}

#[tokio::test]
async fn test_host_disconnect_transfers_and_rejoin_is_not_host() {
    let state = Arc::new(AppState::new());
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;

    ws::handle_disconnect(&state, "conn-a").await;
    {
        let handle = state.find_room(&code).await.unwrap();
        let room = handle.room.lock().await;
        let alice_p = room.player(&alice).unwrap();
        let bob_p = room.player(&bob).unwrap();
        assert!(!alice_p.is_connected);
        assert!(!alice_p.is_host);
        assert!(bob_p.is_host);
    }

    // Same name reclaims the seat but not the host flag.
    let rejoined = join(&state, "conn-a2", &code, "Alice").await;
    assert_eq!(rejoined, alice);
    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert!(room.player(&alice).unwrap().is_connected);
    assert!(!room.player(&alice).unwrap().is_host);
    assert_eq!(room.players.len(), 2);
}

#[tokio::test]
async fn test_self_vote_rejected() {
    let state = Arc::new(AppState::new());
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;

    let own = submission_id_of(&state, &code, &alice).await;
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: own.clone(),
            value: None,
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "SELF_VOTE");

    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert!(room.submissions[&own].votes.is_empty());
}

#[tokio::test]
async fn test_late_trigger_after_transition_is_rejected() {
    let state = Arc::new(AppState::new());
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;

    let alice_dish = submission_id_of(&state, &code, &alice).await;
    let bob_dish = submission_id_of(&state, &code, &bob).await;
    handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish.clone(),
            value: None,
        },
    )
    .await;
    handle_message(
        &state,
        "conn-b",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: alice_dish,
            value: None,
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Results);

    let version = {
        let handle = state.find_room(&code).await.unwrap();
        let room = handle.room.lock().await;
        room.version
    };

    // A vote arriving after the room already moved on is a clean rejection.
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish,
            value: None,
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "WRONG_PHASE");

    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert_eq!(room.version, version);
}

#[tokio::test]
async fn test_double_submission_rejected() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "first").await;

    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::SubmitContent {
            room_code: code.clone(),
            content: Some("second".to_string()),
            image_base64: None,
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "ALREADY_SUBMITTED");
}

#[tokio::test]
async fn test_bound_connection_cannot_join_again() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;

    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::JoinRoom {
            room_code: code,
            name: "Shadow".to_string(),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "DUPLICATE_CONNECTION");
}

#[tokio::test]
async fn test_connected_name_is_taken() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;

    let dispatch = handle_message(
        &state,
        "conn-b",
        ClientMessage::JoinRoom {
            room_code: code,
            name: "alice".to_string(),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "NAME_TAKEN");
}

#[tokio::test]
async fn test_room_capacity() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-0", "Player0").await;
    for i in 1..8 {
        join(&state, &format!("conn-{i}"), &code, &format!("Player{i}")).await;
    }

    let dispatch = handle_message(
        &state,
        "conn-8",
        ClientMessage::JoinRoom {
            room_code: code,
            name: "Player8".to_string(),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "ROOM_FULL");
}

#[tokio::test]
async fn test_leave_completes_waiting_phase() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;
    join(&state, "conn-c", &code, "Carol").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);

    // Carol was the only player still owing a submission.
    handle_message(
        &state,
        "conn-c",
        ClientMessage::LeaveRoom {
            room_code: code.clone(),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);
}

#[tokio::test]
async fn test_last_player_leaving_deletes_room() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;

    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::LeaveRoom {
            room_code: code.clone(),
        },
    )
    .await;
    assert!(dispatch.detach);
    assert!(state.find_room(&code).await.is_none());
}

#[tokio::test]
async fn test_leaver_submission_does_not_advance_round_early() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;
    join(&state, "conn-c", &code, "Carol").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    handle_message(
        &state,
        "conn-a",
        ClientMessage::LeaveRoom {
            room_code: code.clone(),
        },
    )
    .await;

    // Alice's submission is retained, but it must not stand in for Carol's.
    submit(&state, "conn-b", &code, "b").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);

    submit(&state, "conn-c", &code, "c").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);
}

#[tokio::test]
async fn test_orphan_submission_does_not_stall_rating_round() {
    let state = Arc::new(AppState::with_defaults(RoomConfig {
        vote_mode: VoteMode::Rating,
        ..RoomConfig::default()
    }));
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;
    let carol = join(&state, "conn-c", &code, "Carol").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;
    submit(&state, "conn-c", &code, "c").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    let alice_dish = submission_id_of(&state, &code, &alice).await;
    let bob_dish = submission_id_of(&state, &code, &bob).await;
    let carol_dish = submission_id_of(&state, &code, &carol).await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::LeaveRoom {
            room_code: code.clone(),
        },
    )
    .await;

    // The departed player's dish is no longer votable, so it must not be
    // part of anyone's remaining obligation either.
    let dispatch = handle_message(
        &state,
        "conn-b",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: alice_dish,
            value: Some(3),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "TARGET_NOT_IN_ROOM");

    handle_message(
        &state,
        "conn-b",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: carol_dish,
            value: Some(4),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    handle_message(
        &state,
        "conn-c",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish,
            value: Some(2),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Results);
}

#[tokio::test]
async fn test_phase_deadlines_advance_the_room() {
    let state = Arc::new(AppState::with_defaults(RoomConfig {
        submitting_seconds: 1,
        voting_seconds: 1,
        ..RoomConfig::default()
    }));
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Submitting);

    // Submitting deadline passes with one dish outstanding.
    tokio::time::sleep(std::time::Duration::from_millis(1600)).await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    // Voting deadline passes with votes outstanding.
    tokio::time::sleep(std::time::Duration::from_millis(1600)).await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Results);
}

#[tokio::test]
async fn test_stale_timer_does_not_refire_transition() {
    let state = Arc::new(AppState::with_defaults(RoomConfig {
        submitting_seconds: 1,
        ..RoomConfig::default()
    }));
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;

    // Host ends submitting before the timer fires.
    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartVoting {
            room_code: code.clone(),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);
    let version = {
        let handle = state.find_room(&code).await.unwrap();
        let room = handle.room.lock().await;
        room.version
    };

    // The armed submitting timer expires against a room that moved on.
    tokio::time::sleep(std::time::Duration::from_millis(1600)).await;
    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    assert_eq!(room.phase, RoomPhase::Voting);
    assert_eq!(room.version, version);
}

#[tokio::test]
async fn test_concurrent_duplicate_trigger_transitions_once() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    join(&state, "conn-b", &code, "Bob").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;

    let handle = state.find_room(&code).await.unwrap();
    let mut rx = handle.subscribe();
    let version = handle.room.lock().await.version;

    let (d1, d2) = tokio::join!(
        handle_message(
            &state,
            "conn-a",
            ClientMessage::StartVoting {
                room_code: code.clone(),
            },
        ),
        handle_message(
            &state,
            "conn-a",
            ClientMessage::StartVoting {
                room_code: code.clone(),
            },
        ),
    );

    // Exactly one trigger wins; the duplicate sees the new phase and no-ops.
    let errors: Vec<&potluck::ws::handlers::Dispatch> = [&d1, &d2]
        .into_iter()
        .filter(|d| matches!(d.reply, Some(ServerMessage::Error { .. })))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(error_code(errors[0]), "WRONG_PHASE");

    let room = handle.room.lock().await;
    assert_eq!(room.phase, RoomPhase::Voting);
    assert_eq!(room.version, version + 1);
    drop(room);

    let mut voting_started = 0;
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, ServerMessage::VotingStarted { .. }) {
            voting_started += 1;
        }
    }
    assert_eq!(voting_started, 1);
}

#[tokio::test]
async fn test_rejected_leave_keeps_session_bound() {
    let state = Arc::new(AppState::new());
    let (code, _) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;

    // Bob's player record disappears out from under his session.
    {
        let handle = state.find_room(&code).await.unwrap();
        let mut room = handle.room.lock().await;
        room.players.retain(|p| p.id != bob);
    }

    let dispatch = handle_message(
        &state,
        "conn-b",
        ClientMessage::LeaveRoom {
            room_code: code.clone(),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "PLAYER_NOT_FOUND");
    assert!(state.resolve("conn-b").await.is_some());
}

#[tokio::test]
async fn test_rating_mode_flow() {
    let state = Arc::new(AppState::with_defaults(RoomConfig {
        vote_mode: VoteMode::Rating,
        ..RoomConfig::default()
    }));
    let (code, alice) = create(&state, "conn-a", "Alice").await;
    let bob = join(&state, "conn-b", &code, "Bob").await;
    let carol = join(&state, "conn-c", &code, "Carol").await;

    handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame {
            room_code: code.clone(),
        },
    )
    .await;
    submit(&state, "conn-a", &code, "a").await;
    submit(&state, "conn-b", &code, "b").await;
    submit(&state, "conn-c", &code, "c").await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    let alice_dish = submission_id_of(&state, &code, &alice).await;
    let bob_dish = submission_id_of(&state, &code, &bob).await;
    let carol_dish = submission_id_of(&state, &code, &carol).await;

    // A rating without a value is rejected.
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish.clone(),
            value: None,
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "VOTE_VALUE_INVALID");

    let ratings: Vec<(&str, &str, u32)> = vec![
        ("conn-a", &bob_dish, 5),
        ("conn-a", &carol_dish, 2),
        ("conn-b", &alice_dish, 3),
        ("conn-b", &carol_dish, 1),
        ("conn-c", &alice_dish, 2),
    ];
    for (conn, target, value) in ratings {
        handle_message(
            &state,
            conn,
            ClientMessage::CastVote {
                room_code: code.clone(),
                target_id: target.to_string(),
                value: Some(value),
            },
        )
        .await;
    }
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Voting);

    // Re-rating the same dish is rejected and completes nothing.
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish.clone(),
            value: Some(1),
        },
    )
    .await;
    assert_eq!(error_code(&dispatch), "ALREADY_VOTED");

    handle_message(
        &state,
        "conn-c",
        ClientMessage::CastVote {
            room_code: code.clone(),
            target_id: bob_dish,
            value: Some(4),
        },
    )
    .await;
    assert_eq!(phase_of(&state, &code).await, RoomPhase::Results);

    let handle = state.find_room(&code).await.unwrap();
    let room = handle.room.lock().await;
    let ranked = potluck::state::vote::ranked(&room);
    assert_eq!(ranked[0].0.player_id, bob);
    assert_eq!(ranked[0].1, 9);
    assert_eq!(ranked[1].0.player_id, alice);
    assert_eq!(ranked[1].1, 5);
    assert_eq!(ranked[2].0.player_id, carol);
    assert_eq!(ranked[2].1, 3);
}

#[tokio::test]
async fn test_join_events_reach_subscribers() {
    let state = Arc::new(AppState::new());
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CreateRoom {
            name: "Alice".to_string(),
        },
    )
    .await;
    let code = match &dispatch.reply {
        Some(ServerMessage::RoomCreated { room }) => room.code.clone(),
        other => panic!("Expected RoomCreated, got {other:?}"),
    };
    let mut rx = dispatch.subscribe.expect("creator should be subscribed");

    join(&state, "conn-b", &code, "Bob").await;

    match rx.try_recv().unwrap() {
        ServerMessage::PlayerJoined { name, .. } => assert_eq!(name, "Bob"),
        other => panic!("Expected PlayerJoined, got {other:?}"),
    }
    match rx.try_recv().unwrap() {
        ServerMessage::RoomUpdate { room } => assert_eq!(room.players.len(), 2),
        other => panic!("Expected RoomUpdate, got {other:?}"),
    }
}

#[tokio::test]
async fn test_errors_are_not_broadcast() {
    let state = Arc::new(AppState::new());
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::CreateRoom {
            name: "Alice".to_string(),
        },
    )
    .await;
    let code = match &dispatch.reply {
        Some(ServerMessage::RoomCreated { room }) => room.code.clone(),
        other => panic!("Expected RoomCreated, got {other:?}"),
    };
    let mut rx = dispatch.subscribe.expect("creator should be subscribed");

    // Starting alone fails; the failure stays on the caller's connection.
    let dispatch = handle_message(
        &state,
        "conn-a",
        ClientMessage::StartGame { room_code: code },
    )
    .await;
    assert_eq!(error_code(&dispatch), "NOT_ENOUGH_PLAYERS");
    assert!(rx.try_recv().is_err());
}
