use crate::types::RoomPhase;

/// Coordinator errors. Each variant carries a stable machine-readable code
/// (see [`GameError::code`]) surfaced in `error{code, msg}` frames to the
/// originating connection; errors are never broadcast.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    // Validation - rejected before any lookup
    #[error("invalid name: {0}")]
    NameInvalid(String),
    #[error("invalid room code: {0}")]
    CodeInvalid(String),
    #[error("submission content is missing")]
    ContentMissing,
    #[error("unusable submission content: {0}")]
    ContentInvalid(String),
    #[error("invalid vote value: {0}")]
    VoteValueInvalid(u32),

    // State - rejected at the transition boundary
    #[error("action not allowed while the room is in {actual:?}")]
    WrongPhase { actual: RoomPhase },
    #[error("at least {0} players are required to start")]
    NotEnoughPlayers(usize),
    #[error("the round time limit has expired")]
    RoundExpired,

    // Authorization
    #[error("only the host may do that")]
    NotHost,

    // Not-found
    #[error("room not found: {0}")]
    RoomNotFound(String),
    #[error("no player is bound to this connection")]
    PlayerNotFound,
    #[error("submission not found: {0}")]
    TargetNotFound(String),

    // Conflict
    #[error("name already taken: {0}")]
    NameTaken(String),
    #[error("room is full")]
    RoomFull,
    #[error("connection is already bound to a player")]
    DuplicateConnection,
    #[error("already submitted this round")]
    AlreadySubmitted,
    #[error("already voted")]
    AlreadyVoted,
    #[error("cannot vote for your own submission")]
    SelfVote,
    #[error("the submission's owner is no longer in the room")]
    TargetNotInRoom,

    // Internal - transient failures that exhausted their retries end up here;
    // details go to the log, not the client
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NameInvalid(_) => "NAME_INVALID",
            GameError::CodeInvalid(_) => "CODE_INVALID",
            GameError::ContentMissing => "CONTENT_MISSING",
            GameError::ContentInvalid(_) => "CONTENT_INVALID",
            GameError::VoteValueInvalid(_) => "VOTE_VALUE_INVALID",
            GameError::WrongPhase { .. } => "WRONG_PHASE",
            GameError::NotEnoughPlayers(_) => "NOT_ENOUGH_PLAYERS",
            GameError::RoundExpired => "ROUND_EXPIRED",
            GameError::NotHost => "NOT_HOST",
            GameError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            GameError::PlayerNotFound => "PLAYER_NOT_FOUND",
            GameError::TargetNotFound(_) => "TARGET_NOT_FOUND",
            GameError::NameTaken(_) => "NAME_TAKEN",
            GameError::RoomFull => "ROOM_FULL",
            GameError::DuplicateConnection => "DUPLICATE_CONNECTION",
            GameError::AlreadySubmitted => "ALREADY_SUBMITTED",
            GameError::AlreadyVoted => "ALREADY_VOTED",
            GameError::SelfVote => "SELF_VOTE",
            GameError::TargetNotInRoom => "TARGET_NOT_IN_ROOM",
            GameError::Internal(_) => "INTERNAL",
        }
    }
}
