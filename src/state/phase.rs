//! The room lifecycle state machine.
//!
//! Every transition runs under the room's lock and re-checks the current
//! phase first, so any trigger (all-done detection, timer expiry, host
//! force) that arrives late becomes a no-op instead of a double advance.

use crate::error::GameError;
use crate::types::*;
use chrono::{Duration, Utc};

pub fn is_valid_transition(from: RoomPhase, to: RoomPhase) -> bool {
    matches!(
        (from, to),
        (RoomPhase::Lobby, RoomPhase::Submitting)
            | (RoomPhase::Submitting, RoomPhase::Voting)
            | (RoomPhase::Voting, RoomPhase::Results)
            | (RoomPhase::Results, RoomPhase::Lobby)
    )
}

/// Apply a single transition and its entry effects. Fails without mutating
/// anything if the transition isn't legal from the room's current phase.
pub fn advance(room: &mut Room, to: RoomPhase) -> Result<(), GameError> {
    if !is_valid_transition(room.phase, to) {
        return Err(GameError::WrongPhase { actual: room.phase });
    }

    let now = Utc::now();
    match to {
        RoomPhase::Submitting => {
            room.round += 1;
            room.submissions.clear();
            room.round_started_at = Some(now.to_rfc3339());
            room.phase_deadline =
                Some((now + Duration::seconds(room.config.submitting_seconds as i64)).to_rfc3339());
        }
        RoomPhase::Voting => {
            room.phase_deadline =
                Some((now + Duration::seconds(room.config.voting_seconds as i64)).to_rfc3339());
        }
        RoomPhase::Results => {
            room.phase_deadline = None;
        }
        RoomPhase::Lobby => {
            room.prompt = None;
            room.round_started_at = None;
            room.phase_deadline = None;
            room.submissions.clear();
        }
    }

    tracing::info!(code = %room.code, from = ?room.phase, to = ?to, round = room.round, "phase transition");
    room.phase = to;
    room.version += 1;
    room.touch();
    Ok(())
}

/// Shared preconditions for the host starting a round from the lobby.
pub fn can_start(room: &Room, caller: &str) -> Result<(), GameError> {
    let player = room.player(caller).ok_or(GameError::PlayerNotFound)?;
    if !player.is_host {
        return Err(GameError::NotHost);
    }
    if room.phase != RoomPhase::Lobby {
        return Err(GameError::WrongPhase { actual: room.phase });
    }
    if room.players.len() < MIN_PLAYERS_TO_START {
        return Err(GameError::NotEnoughPlayers(MIN_PLAYERS_TO_START));
    }
    Ok(())
}

pub fn start_game(room: &mut Room, caller: &str, prompt: String) -> Result<(), GameError> {
    can_start(room, caller)?;
    room.prompt = Some(prompt);
    advance(room, RoomPhase::Submitting)
}

/// Host-forced early end of the submitting window.
pub fn force_voting(room: &mut Room, caller: &str) -> Result<RoomPhase, GameError> {
    let player = room.player(caller).ok_or(GameError::PlayerNotFound)?;
    if !player.is_host {
        return Err(GameError::NotHost);
    }
    if room.phase != RoomPhase::Submitting {
        return Err(GameError::WrongPhase { actual: room.phase });
    }
    close_submitting(room)
}

/// End the submitting window with whatever submissions exist. With zero
/// submissions there is nothing to vote on, so voting completes immediately
/// and the room lands in results. Returns the phase actually reached.
pub fn close_submitting(room: &mut Room) -> Result<RoomPhase, GameError> {
    advance(room, RoomPhase::Voting)?;
    if room.all_voted() {
        advance(room, RoomPhase::Results)?;
    }
    Ok(room.phase)
}

pub fn close_voting(room: &mut Room) -> Result<(), GameError> {
    advance(room, RoomPhase::Results)
}

/// Advance out of submitting if every current player has submitted.
/// Safe to call after any event that could complete the phase. Checked per
/// player rather than by count, since a leaver's retained submission would
/// otherwise stand in for someone who still owes one.
pub fn try_complete_submitting(room: &mut Room) -> Result<Option<RoomPhase>, GameError> {
    let everyone_submitted = !room.players.is_empty()
        && room
            .players
            .iter()
            .all(|p| room.submission_by_player(&p.id).is_some());
    if room.phase == RoomPhase::Submitting && everyone_submitted {
        return Ok(Some(close_submitting(room)?));
    }
    Ok(None)
}

/// Advance out of voting if every current player has cast all required votes.
pub fn try_complete_voting(room: &mut Room) -> Result<Option<RoomPhase>, GameError> {
    if room.phase == RoomPhase::Voting && room.all_voted() {
        close_voting(room)?;
        return Ok(Some(RoomPhase::Results));
    }
    Ok(None)
}

/// Host-only return to the lobby once results are up.
pub fn reset_to_lobby(room: &mut Room, caller: &str) -> Result<(), GameError> {
    let player = room.player(caller).ok_or(GameError::PlayerNotFound)?;
    if !player.is_host {
        return Err(GameError::NotHost);
    }
    if room.phase != RoomPhase::Results {
        return Err(GameError::WrongPhase { actual: room.phase });
    }
    advance(room, RoomPhase::Lobby)
}
