//! Per-operation message handlers.
//!
//! Each handler resolves the caller's session, takes the room lock for the
//! whole validate-mutate-snapshot sequence, broadcasts inside the critical
//! section, then persists after dropping the lock.

use crate::assets;
use crate::broadcast::{announce_transition, broadcast_room, broadcast_update};
use crate::error::GameError;
use crate::protocol::{ClientMessage, RoomSnapshot, ServerMessage};
use crate::state::{directory, phase, registry, roster, submission, vote};
use crate::state::{AppState, RoomHandle, Session};
use std::sync::Arc;
use tokio::sync::broadcast::Receiver;

/// What the socket loop should do after a handled message.
pub struct Dispatch {
    /// Sent to the calling connection only.
    pub reply: Option<ServerMessage>,
    /// New room subscription for this connection.
    pub subscribe: Option<Receiver<ServerMessage>>,
    /// Drop the current room subscription.
    pub detach: bool,
}

impl Dispatch {
    pub fn none() -> Self {
        Self {
            reply: None,
            subscribe: None,
            detach: false,
        }
    }

    pub fn reply(msg: ServerMessage) -> Self {
        Self {
            reply: Some(msg),
            subscribe: None,
            detach: false,
        }
    }

    pub fn error(e: &GameError) -> Self {
        Self::reply(ServerMessage::from(e))
    }
}

pub async fn handle_message(
    state: &Arc<AppState>,
    conn_id: &str,
    msg: ClientMessage,
) -> Dispatch {
    let result = match msg {
        ClientMessage::CreateRoom { name } => create_room(state, conn_id, &name).await,
        ClientMessage::JoinRoom { room_code, name } => {
            join_room(state, conn_id, &room_code, &name).await
        }
        ClientMessage::LeaveRoom { room_code } => leave_room(state, conn_id, &room_code).await,
        ClientMessage::StartGame { room_code } => start_game(state, conn_id, &room_code).await,
        ClientMessage::SubmitContent {
            room_code,
            content,
            image_base64,
        } => submit_content(state, conn_id, &room_code, content, image_base64).await,
        ClientMessage::StartVoting { room_code } => {
            start_voting(state, conn_id, &room_code).await
        }
        ClientMessage::CastVote {
            room_code,
            target_id,
            value,
        } => cast_vote(state, conn_id, &room_code, &target_id, value).await,
        ClientMessage::ResetToLobby { room_code } => {
            reset_to_lobby(state, conn_id, &room_code).await
        }
    };

    match result {
        Ok(dispatch) => dispatch,
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "rejected client message");
            Dispatch::error(&e)
        }
    }
}

/// Resolve the caller's binding and check it matches the room they named.
async fn require_session(
    state: &AppState,
    conn_id: &str,
    raw_code: &str,
) -> Result<(Session, Arc<RoomHandle>), GameError> {
    let session = state
        .resolve(conn_id)
        .await
        .ok_or(GameError::PlayerNotFound)?;
    let code = directory::normalize_code(raw_code)?;
    if session.room_code != code {
        return Err(GameError::RoomNotFound(code));
    }
    let handle = state
        .find_room(&code)
        .await
        .ok_or(GameError::RoomNotFound(code))?;
    Ok((session, handle))
}

async fn create_room(state: &Arc<AppState>, conn_id: &str, name: &str) -> Result<Dispatch, GameError> {
    let handle = state.create_room(name, conn_id).await?;
    let room = handle.room.lock().await;
    let snapshot = RoomSnapshot::of(&room);
    let record = room.clone();
    drop(room);
    state.persist(record.version - 1, &record).await;

    Ok(Dispatch {
        reply: Some(ServerMessage::RoomCreated { room: snapshot }),
        subscribe: Some(handle.subscribe()),
        detach: false,
    })
}

async fn join_room(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
    name: &str,
) -> Result<Dispatch, GameError> {
    let name = registry::validate_name(name)?;
    let code = directory::normalize_code(raw_code)?;
    state.ensure_unbound(conn_id).await?;
    let handle = state
        .find_room(&code)
        .await
        .ok_or_else(|| GameError::RoomNotFound(code.clone()))?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    let (player, kind) = roster::admit(&mut room, &name)?;
    state.bind(conn_id, code.clone(), player.id.clone()).await;
    tracing::info!(code = %code, player = %player.name, ?kind, "player joined");

    let announce = match kind {
        roster::JoinKind::Fresh => ServerMessage::PlayerJoined {
            player_id: player.id.clone(),
            name: player.name.clone(),
        },
        roster::JoinKind::Reconnected => ServerMessage::PlayerReconnected {
            player_id: player.id.clone(),
            name: player.name.clone(),
        },
    };
    broadcast_room(&handle, announce);
    broadcast_update(&handle, &room);

    let snapshot = RoomSnapshot::of(&room);
    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;

    Ok(Dispatch {
        reply: Some(ServerMessage::RoomJoined { room: snapshot }),
        subscribe: Some(handle.subscribe()),
        detach: false,
    })
}

async fn leave_room(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    let player = roster::remove_player(&mut room, &session.player_id)
        .ok_or(GameError::PlayerNotFound)?;
    // Only release the binding once the roster mutation has gone through,
    // so a rejected leave leaves the session intact.
    state.unbind(conn_id).await;
    tracing::info!(code = %room.code, player = %player.name, "player left");

    let left = ServerMessage::PlayerLeft {
        player_id: player.id,
        name: player.name,
    };

    if room.players.is_empty() {
        let code = room.code.clone();
        drop(room);
        state.delete_room(&code).await;
        return Ok(Dispatch {
            reply: Some(left),
            subscribe: None,
            detach: true,
        });
    }

    broadcast_room(&handle, left.clone());

    // The departure may have been the last thing the phase was waiting on.
    let completed = match room.phase {
        crate::types::RoomPhase::Submitting => phase::try_complete_submitting(&mut room)?,
        crate::types::RoomPhase::Voting => phase::try_complete_voting(&mut room)?,
        _ => None,
    };
    match completed {
        Some(_) => announce_transition(state, &handle, &room),
        None => broadcast_update(&handle, &room),
    }

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;

    Ok(Dispatch {
        reply: Some(left),
        subscribe: None,
        detach: true,
    })
}

async fn start_game(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    // Fail fast before paying for prompt generation.
    {
        let room = handle.room.lock().await;
        phase::can_start(&room, &session.player_id)?;
    }

    let prompt = state.generator.generate(None).await.map_err(|e| {
        tracing::error!(error = %e, "prompt generation failed");
        GameError::Internal("prompt generation failed".to_string())
    })?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    // Re-validates: the room may have changed while generating.
    phase::start_game(&mut room, &session.player_id, prompt)?;
    announce_transition(state, &handle, &room);

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;
    Ok(Dispatch::none())
}

async fn submit_content(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
    content: Option<String>,
    image_base64: Option<String>,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    let content_url = match image_base64 {
        Some(payload) => {
            let bytes = assets::decode_image(&payload)
                .map_err(|e| GameError::ContentInvalid(e.to_string()))?;
            state
                .assets
                .upload(bytes, &session.player_id)
                .await
                .map_err(|e| GameError::ContentInvalid(e.to_string()))?
        }
        None => {
            let content = content.map(|c| c.trim().to_string()).unwrap_or_default();
            if content.is_empty() {
                return Err(GameError::ContentMissing);
            }
            content
        }
    };

    let mut room = handle.room.lock().await;
    let prev = room.version;
    let accepted = submission::submit(&mut room, &session.player_id, content_url)?;
    tracing::info!(code = %room.code, player = %session.player_id, "submission received");

    broadcast_room(
        &handle,
        ServerMessage::SubmissionUpdate {
            submitted: room.submitted_count() as u32,
            total: room.players.len() as u32,
        },
    );
    match phase::try_complete_submitting(&mut room)? {
        Some(_) => announce_transition(state, &handle, &room),
        None => broadcast_update(&handle, &room),
    }

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;

    Ok(Dispatch::reply(ServerMessage::SubmissionConfirmed {
        submission_id: accepted.id,
        content_url: accepted.content_url,
    }))
}

async fn start_voting(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    phase::force_voting(&mut room, &session.player_id)?;
    announce_transition(state, &handle, &room);

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;
    Ok(Dispatch::none())
}

async fn cast_vote(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
    target_id: &str,
    value: Option<u32>,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    vote::cast_vote(&mut room, &session.player_id, target_id, value)?;

    broadcast_room(
        &handle,
        ServerMessage::VoteUpdate {
            voted: room.voted_count() as u32,
            total: room.players.len() as u32,
        },
    );
    match phase::try_complete_voting(&mut room)? {
        Some(_) => announce_transition(state, &handle, &room),
        None => broadcast_update(&handle, &room),
    }

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;
    Ok(Dispatch::none())
}

async fn reset_to_lobby(
    state: &Arc<AppState>,
    conn_id: &str,
    raw_code: &str,
) -> Result<Dispatch, GameError> {
    let (session, handle) = require_session(state, conn_id, raw_code).await?;

    let mut room = handle.room.lock().await;
    let prev = room.version;
    phase::reset_to_lobby(&mut room, &session.player_id)?;
    announce_transition(state, &handle, &room);

    let record = room.clone();
    drop(room);
    state.persist(prev, &record).await;
    Ok(Dispatch::none())
}
