//! Player roster mutations: joining, reconnecting, leaving and host
//! succession. All functions assume the caller holds the room's lock.

use crate::error::GameError;
use crate::types::*;
use ulid::Ulid;

/// Whether an admit was a brand-new player or a returning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Fresh,
    Reconnected,
}

/// Preferred successor when the host drops: the earliest-joined player who is
/// still connected and isn't already the host.
pub fn next_host(players: &[Player]) -> Option<&Player> {
    players
        .iter()
        .filter(|p| p.is_connected && !p.is_host)
        .min_by_key(|p| p.join_order)
}

/// Admit a player by name. A disconnected player with the same name
/// (case-insensitive) reconnects into their old seat, keeping their id, host
/// flag and accumulated round state.
pub fn admit(room: &mut Room, name: &str) -> Result<(Player, JoinKind), GameError> {
    let lowered = name.to_lowercase();
    if let Some(existing) = room
        .players
        .iter_mut()
        .find(|p| p.name.to_lowercase() == lowered)
    {
        if existing.is_connected {
            return Err(GameError::NameTaken(name.to_string()));
        }
        existing.is_connected = true;
        let player = existing.clone();
        room.version += 1;
        room.touch();
        return Ok((player, JoinKind::Reconnected));
    }

    if room.players.len() >= room.config.max_players {
        return Err(GameError::RoomFull);
    }

    let join_order = room
        .players
        .iter()
        .map(|p| p.join_order + 1)
        .max()
        .unwrap_or(0);
    let player = Player {
        id: Ulid::new().to_string(),
        name: name.to_string(),
        is_host: false,
        is_connected: true,
        join_order,
    };
    room.players.push(player.clone());
    room.version += 1;
    room.touch();
    Ok((player, JoinKind::Fresh))
}

/// Permanently remove a player. If they were the host, the host flag moves to
/// the best connected successor, falling back to the earliest-joined survivor
/// so a non-empty room always has exactly one host.
pub fn remove_player(room: &mut Room, player_id: &str) -> Option<Player> {
    let idx = room.players.iter().position(|p| p.id == player_id)?;
    let removed = room.players.remove(idx);

    if removed.is_host && !room.players.is_empty() {
        let successor_id = next_host(&room.players)
            .or_else(|| room.players.iter().min_by_key(|p| p.join_order))
            .map(|p| p.id.clone());
        if let Some(id) = successor_id {
            for p in &mut room.players {
                p.is_host = p.id == id;
            }
        }
    }

    room.version += 1;
    room.touch();
    Some(removed)
}

/// Mark a player disconnected, transferring the host flag if a connected
/// successor exists. A host with no connected peers keeps the flag, so they
/// resume as host on reconnect.
pub fn mark_disconnected(room: &mut Room, player_id: &str) -> Option<Player> {
    let idx = room.players.iter().position(|p| p.id == player_id)?;
    room.players[idx].is_connected = false;
    let was_host = room.players[idx].is_host;

    if was_host {
        if let Some(successor_id) = next_host(&room.players).map(|p| p.id.clone()) {
            for p in &mut room.players {
                p.is_host = p.id == successor_id;
            }
        }
    }

    room.version += 1;
    room.touch();
    Some(room.players[idx].clone())
}
