use crate::types::{RoomConfig, VoteMode};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub submitting_seconds: u32,
    pub voting_seconds: u32,
    pub max_players: usize,
    pub vote_mode: VoteMode,
    pub generator_url: Option<String>,
    pub idle_grace_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            submitting_seconds: 180,
            voting_seconds: 60,
            max_players: 8,
            vote_mode: VoteMode::Single,
            generator_url: None,
            idle_grace_seconds: 300,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let vote_mode = match std::env::var("POTLUCK_VOTE_MODE") {
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "single" => VoteMode::Single,
                "rating" => VoteMode::Rating,
                other => {
                    tracing::warn!(value = other, "unknown vote mode, using single");
                    VoteMode::Single
                }
            },
            Err(_) => defaults.vote_mode,
        };
        let generator_url = std::env::var("POTLUCK_PROMPT_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            port: env_parse("POTLUCK_PORT", defaults.port),
            submitting_seconds: env_parse("POTLUCK_SUBMIT_SECONDS", defaults.submitting_seconds),
            voting_seconds: env_parse("POTLUCK_VOTE_SECONDS", defaults.voting_seconds),
            max_players: env_parse("POTLUCK_MAX_PLAYERS", defaults.max_players),
            vote_mode,
            generator_url,
            idle_grace_seconds: env_parse("POTLUCK_IDLE_GRACE_SECONDS", defaults.idle_grace_seconds),
        }
    }

    /// Per-room defaults derived from process configuration.
    pub fn room_defaults(&self) -> RoomConfig {
        RoomConfig {
            submitting_seconds: self.submitting_seconds,
            voting_seconds: self.voting_seconds,
            max_players: self.max_players,
            vote_mode: self.vote_mode,
        }
    }
}
