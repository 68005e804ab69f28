use crate::error::GameError;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
    },
    JoinRoom {
        room_code: String,
        name: String,
    },
    LeaveRoom {
        room_code: String,
    },
    StartGame {
        room_code: String,
    },
    SubmitContent {
        room_code: String,
        /// Ready-made content reference (URL or text)
        #[serde(default)]
        content: Option<String>,
        /// Inline image payload; uploaded through the asset store first
        #[serde(default)]
        image_base64: Option<String>,
    },
    /// Host-forced early transition to voting
    StartVoting {
        room_code: String,
    },
    CastVote {
        room_code: String,
        target_id: SubmissionId,
        /// Required in rating mode (1..=5), ignored in single mode
        #[serde(default)]
        value: Option<u32>,
    },
    /// Host-only: back to the lobby after results
    ResetToLobby {
        room_code: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        room: RoomSnapshot,
    },
    RoomJoined {
        room: RoomSnapshot,
    },
    /// Full authoritative snapshot, broadcast after every successful mutation
    RoomUpdate {
        room: RoomSnapshot,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
    },
    PlayerLeft {
        player_id: PlayerId,
        name: String,
    },
    PlayerDisconnected {
        player_id: PlayerId,
        name: String,
    },
    PlayerReconnected {
        player_id: PlayerId,
        name: String,
    },
    GameStarted {
        round: u32,
        prompt: String,
        deadline: Option<String>,
    },
    VotingStarted {
        round: u32,
        submissions: Vec<SubmissionInfo>,
        deadline: Option<String>,
    },
    ResultsReady {
        round: u32,
        winner: Option<TallyInfo>,
        tallies: Vec<TallyInfo>,
    },
    SubmissionUpdate {
        submitted: u32,
        total: u32,
    },
    VoteUpdate {
        voted: u32,
        total: u32,
    },
    /// Sent to the submitting player only
    SubmissionConfirmed {
        submission_id: SubmissionId,
        content_url: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<&GameError> for ServerMessage {
    fn from(e: &GameError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}

/// Full room view; always broadcast whole so a client that missed an
/// intermediate event can recover from the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub phase: RoomPhase,
    pub round: u32,
    pub prompt: Option<String>,
    pub players: Vec<PlayerInfo>,
    pub submitted: u32,
    pub voted: u32,
    pub deadline: Option<String>,
    pub server_now: String,
    pub version: u64,
}

impl RoomSnapshot {
    pub fn of(room: &Room) -> Self {
        Self {
            code: room.code.clone(),
            phase: room.phase,
            round: room.round,
            prompt: room.prompt.clone(),
            players: room.players.iter().map(PlayerInfo::from).collect(),
            submitted: room.submitted_count() as u32,
            voted: room.voted_count() as u32,
            deadline: room.phase_deadline.clone(),
            server_now: chrono::Utc::now().to_rfc3339(),
            version: room.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_connected: bool,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            is_host: p.is_host,
            is_connected: p.is_connected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionInfo {
    pub id: SubmissionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub content_url: String,
    pub created_at: String,
}

/// Current-round submissions in a stable display order (by creation time).
pub fn submission_infos(room: &Room) -> Vec<SubmissionInfo> {
    let mut infos: Vec<SubmissionInfo> = room
        .round_submissions()
        .map(|s| SubmissionInfo {
            id: s.id.clone(),
            player_id: s.player_id.clone(),
            player_name: room
                .player(&s.player_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| s.player_id.clone()),
            content_url: s.content_url.clone(),
            created_at: s.created_at.clone(),
        })
        .collect();
    infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    infos
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyInfo {
    pub submission_id: SubmissionId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: u32,
}
