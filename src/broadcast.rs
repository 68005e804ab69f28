//! Room event fan-out and the background tasks that move rooms along
//! without client input (phase timers, idle reaping).

use crate::protocol::{submission_infos, RoomSnapshot, ServerMessage, TallyInfo};
use crate::state::{phase, vote, AppState, RoomHandle};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Send an event to every connection subscribed to the room. A send error
/// only means nobody is listening right now.
pub fn broadcast_room(handle: &RoomHandle, msg: ServerMessage) {
    if handle.events.send(msg).is_err() {
        tracing::debug!("no listeners on room channel");
    }
}

/// Broadcast the authoritative post-mutation snapshot.
pub fn broadcast_update(handle: &RoomHandle, room: &Room) {
    broadcast_room(handle, ServerMessage::RoomUpdate {
        room: RoomSnapshot::of(room),
    });
}

/// Announce whatever phase the room just entered, schedule its timer if it
/// has one, and follow with the snapshot. Call with the room lock held so
/// the announcement matches the state it describes.
pub fn announce_transition(state: &Arc<AppState>, handle: &RoomHandle, room: &Room) {
    match room.phase {
        RoomPhase::Submitting => {
            broadcast_room(handle, ServerMessage::GameStarted {
                round: room.round,
                prompt: room.prompt.clone().unwrap_or_default(),
                deadline: room.phase_deadline.clone(),
            });
            spawn_deadline(state, room);
        }
        RoomPhase::Voting => {
            broadcast_room(handle, ServerMessage::VotingStarted {
                round: room.round,
                submissions: submission_infos(room),
                deadline: room.phase_deadline.clone(),
            });
            spawn_deadline(state, room);
        }
        RoomPhase::Results => {
            let tallies: Vec<TallyInfo> = vote::ranked(room)
                .into_iter()
                .map(|(s, score)| TallyInfo {
                    submission_id: s.id.clone(),
                    player_id: s.player_id.clone(),
                    player_name: room
                        .player(&s.player_id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| s.player_id.clone()),
                    score,
                })
                .collect();
            broadcast_room(handle, ServerMessage::ResultsReady {
                round: room.round,
                winner: tallies.first().cloned(),
                tallies,
            });
        }
        RoomPhase::Lobby => {}
    }
    broadcast_update(handle, room);
}

fn spawn_deadline(state: &Arc<AppState>, room: &Room) {
    let Some(raw) = &room.phase_deadline else {
        return;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(deadline) => spawn_phase_timer(
            state.clone(),
            room.code.clone(),
            room.phase,
            room.round,
            deadline.with_timezone(&Utc),
        ),
        Err(e) => {
            tracing::warn!(code = %room.code, error = %e, "unparseable phase deadline, timer not scheduled");
        }
    }
}

/// Sleep until the deadline, then force the phase's expiry transition if the
/// room is still in the same phase and round. Anything else means the phase
/// already ended some other way and the timer is stale.
pub fn spawn_phase_timer(
    state: Arc<AppState>,
    code: RoomCode,
    armed_phase: RoomPhase,
    armed_round: u32,
    deadline: DateTime<Utc>,
) {
    tokio::spawn(async move {
        let wait = deadline
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or_default();
        tokio::time::sleep(wait).await;

        let Some(handle) = state.find_room(&code).await else {
            return;
        };
        let mut room = handle.room.lock().await;
        if room.phase != armed_phase || room.round != armed_round {
            return;
        }

        let prev = room.version;
        let result = match armed_phase {
            RoomPhase::Submitting => phase::close_submitting(&mut room).map(|_| ()),
            RoomPhase::Voting => phase::close_voting(&mut room),
            _ => return,
        };
        match result {
            Ok(()) => {
                tracing::info!(code = %code, phase = ?armed_phase, round = armed_round, "phase deadline expired");
                announce_transition(&state, &handle, &room);
                let record = room.clone();
                drop(room);
                state.persist(prev, &record).await;
            }
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "timer transition rejected");
            }
        }
    });
}

/// Periodically delete rooms whose every player has disconnected and that
/// have been quiet past the grace period.
pub fn spawn_idle_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;

            let handles: Vec<(RoomCode, Arc<RoomHandle>)> = state
                .rooms
                .read()
                .await
                .iter()
                .map(|(code, handle)| (code.clone(), handle.clone()))
                .collect();

            for (code, handle) in handles {
                let reap = {
                    let room = handle.room.lock().await;
                    room.players.iter().all(|p| !p.is_connected)
                        && age(&room.last_activity) > state.idle_grace
                };
                if reap {
                    tracing::info!(code = %code, "reaping idle room");
                    state.delete_room(&code).await;
                }
            }
        }
    });
}

fn age(last_activity: &str) -> Duration {
    DateTime::parse_from_rfc3339(last_activity)
        .ok()
        .and_then(|t| (Utc::now() - t.with_timezone(&Utc)).to_std().ok())
        .unwrap_or_default()
}
