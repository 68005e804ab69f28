use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type ConnectionId = String;
pub type SubmissionId = String;

/// Minimum roster size for `startGame`
pub const MIN_PLAYERS_TO_START: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    Lobby,
    Submitting,
    Voting,
    Results,
}

/// How a round's winner is determined: one discrete vote per voter, or a
/// rating cast against every other player's submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteMode {
    Single,
    Rating,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoomConfig {
    pub submitting_seconds: u32,
    pub voting_seconds: u32,
    pub max_players: usize,
    pub vote_mode: VoteMode,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            submitting_seconds: 180,
            voting_seconds: 60,
            max_players: 8,
            vote_mode: VoteMode::Single,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_connected: bool,
    /// Position in original join order; host failover walks this.
    pub join_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub player_id: PlayerId,
    pub round: u32,
    pub content_url: String,
    pub created_at: String,
    /// voter id -> vote value (always 1 in single mode, 1..=5 in rating mode)
    pub votes: HashMap<PlayerId, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub phase: RoomPhase,
    pub round: u32,
    pub version: u64,
    pub prompt: Option<String>,
    pub round_started_at: Option<String>,
    pub phase_deadline: Option<String>,
    pub last_activity: String,
    pub config: RoomConfig,
    pub players: Vec<Player>,
    pub submissions: HashMap<SubmissionId, Submission>,
}

impl Room {
    pub fn new(code: RoomCode, host: Player, config: RoomConfig) -> Self {
        Self {
            code,
            phase: RoomPhase::Lobby,
            round: 0,
            version: 1,
            prompt: None,
            round_started_at: None,
            phase_deadline: None,
            last_activity: chrono::Utc::now().to_rfc3339(),
            config,
            players: vec![host],
            submissions: HashMap::new(),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn touch(&mut self) {
        self.last_activity = chrono::Utc::now().to_rfc3339();
    }

    /// Whether the current phase's time limit has passed.
    pub fn deadline_passed(&self) -> bool {
        match &self.phase_deadline {
            Some(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|d| chrono::Utc::now() > d.with_timezone(&chrono::Utc))
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn round_submissions(&self) -> impl Iterator<Item = &Submission> + '_ {
        let round = self.round;
        self.submissions.values().filter(move |s| s.round == round)
    }

    pub fn submission_by_player(&self, player_id: &str) -> Option<&Submission> {
        self.round_submissions().find(|s| s.player_id == player_id)
    }

    pub fn submitted_count(&self) -> usize {
        self.round_submissions().count()
    }
}
