//! Submission intake for the current round.

use crate::error::GameError;
use crate::types::*;
use chrono::Utc;
use std::collections::HashMap;
use ulid::Ulid;

/// Record a player's dish for the current round. One submission per player
/// per round; late arrivals after the deadline are rejected even if the
/// timer task hasn't fired yet.
pub fn submit(
    room: &mut Room,
    player_id: &str,
    content_url: String,
) -> Result<Submission, GameError> {
    if room.phase != RoomPhase::Submitting {
        return Err(GameError::WrongPhase { actual: room.phase });
    }
    if room.deadline_passed() {
        return Err(GameError::RoundExpired);
    }
    if room.player(player_id).is_none() {
        return Err(GameError::PlayerNotFound);
    }
    if room.submission_by_player(player_id).is_some() {
        return Err(GameError::AlreadySubmitted);
    }

    let submission = Submission {
        id: Ulid::new().to_string(),
        player_id: player_id.to_string(),
        round: room.round,
        content_url,
        created_at: Utc::now().to_rfc3339(),
        votes: HashMap::new(),
    };
    room.submissions
        .insert(submission.id.clone(), submission.clone());
    room.version += 1;
    room.touch();
    Ok(submission)
}
