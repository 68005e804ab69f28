//! Vote casting and tallying.
//!
//! Single mode: each voter picks exactly one dish, all votes count 1.
//! Rating mode: each voter rates every other player's dish 1..=5.

use crate::error::GameError;
use crate::types::*;

pub const MIN_RATING: u32 = 1;
pub const MAX_RATING: u32 = 5;

impl Room {
    /// Votes this player has cast across the current round's submissions.
    pub fn votes_cast_by(&self, voter: &str) -> usize {
        self.round_submissions()
            .filter(|s| s.votes.contains_key(voter))
            .count()
    }

    /// How many votes this player must cast before they count as done.
    /// Based on the submissions of *other* players still in the room;
    /// an orphaned submission is unvotable, so counting it would leave the
    /// phase waiting on a vote nobody is allowed to cast.
    pub fn required_votes(&self, voter: &str) -> usize {
        let others = self
            .round_submissions()
            .filter(|s| s.player_id != voter && self.player(&s.player_id).is_some())
            .count();
        match self.config.vote_mode {
            VoteMode::Single => others.min(1),
            VoteMode::Rating => others,
        }
    }

    pub fn voter_done(&self, voter: &str) -> bool {
        self.votes_cast_by(voter) >= self.required_votes(voter)
    }

    /// Players who have finished voting. Counted against the live roster, so
    /// a departure mid-phase shrinks the denominator.
    pub fn voted_count(&self) -> usize {
        self.players.iter().filter(|p| self.voter_done(&p.id)).count()
    }

    pub fn all_voted(&self) -> bool {
        self.players.iter().all(|p| self.voter_done(&p.id))
    }
}

/// Cast one vote. Duplicate detection runs against the target's owner, not
/// the submission id, so single-mode voters can't split votes across rounds
/// of resubmission and rating-mode voters rate each player once.
pub fn cast_vote(
    room: &mut Room,
    voter: &str,
    target_id: &str,
    value: Option<u32>,
) -> Result<u32, GameError> {
    if room.phase != RoomPhase::Voting {
        return Err(GameError::WrongPhase { actual: room.phase });
    }
    if room.player(voter).is_none() {
        return Err(GameError::PlayerNotFound);
    }

    let owner = room
        .round_submissions()
        .find(|s| s.id == target_id)
        .map(|s| s.player_id.clone())
        .ok_or_else(|| GameError::TargetNotFound(target_id.to_string()))?;
    if room.player(&owner).is_none() {
        return Err(GameError::TargetNotInRoom);
    }
    if owner == voter {
        return Err(GameError::SelfVote);
    }

    let already = match room.config.vote_mode {
        VoteMode::Single => room.votes_cast_by(voter) > 0,
        VoteMode::Rating => room
            .round_submissions()
            .any(|s| s.player_id == owner && s.votes.contains_key(voter)),
    };
    if already {
        return Err(GameError::AlreadyVoted);
    }

    let value = match room.config.vote_mode {
        VoteMode::Single => 1,
        VoteMode::Rating => {
            let v = value.ok_or(GameError::VoteValueInvalid(0))?;
            if !(MIN_RATING..=MAX_RATING).contains(&v) {
                return Err(GameError::VoteValueInvalid(v));
            }
            v
        }
    };

    let submission = room
        .submissions
        .get_mut(target_id)
        .ok_or_else(|| GameError::TargetNotFound(target_id.to_string()))?;
    submission.votes.insert(voter.to_string(), value);
    room.version += 1;
    room.touch();
    Ok(value)
}

/// Current-round submissions with their scores, best first. Ties break by
/// earlier submission time, then by the owner's join order.
pub fn ranked(room: &Room) -> Vec<(&Submission, u32)> {
    let mut entries: Vec<(&Submission, u32)> = room
        .round_submissions()
        .map(|s| (s, s.votes.values().sum()))
        .collect();
    entries.sort_by(|(a, sa), (b, sb)| {
        sb.cmp(sa)
            .then_with(|| ts_millis(&a.created_at).cmp(&ts_millis(&b.created_at)))
            .then_with(|| join_order_of(room, &a.player_id).cmp(&join_order_of(room, &b.player_id)))
    });
    entries
}

fn ts_millis(rfc3339: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|d| d.timestamp_millis())
        .unwrap_or(i64::MAX)
}

fn join_order_of(room: &Room, player_id: &str) -> u32 {
    room.player(player_id).map(|p| p.join_order).unwrap_or(u32::MAX)
}
