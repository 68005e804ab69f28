//! Connection registry: the bidirectional link between live transport
//! connections and room membership. Lock ordering rule for the whole crate:
//! never hold the registry lock while acquiring a room lock.

use super::{AppState, Session};
use crate::error::GameError;
use crate::types::*;

const MAX_NAME_LENGTH: usize = 50;

/// Trim and validate a display name.
pub fn validate_name(raw: &str) -> Result<String, GameError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(GameError::NameInvalid(raw.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(GameError::NameInvalid(raw.to_string()));
    }
    Ok(name.to_string())
}

impl AppState {
    pub async fn resolve(&self, conn_id: &str) -> Option<Session> {
        self.connections.read().await.get(conn_id).cloned()
    }

    /// Reject a connection that already holds a binding. Checked before any
    /// roster mutation so a duplicate create/join leaves no trace.
    pub async fn ensure_unbound(&self, conn_id: &str) -> Result<(), GameError> {
        if self.connections.read().await.contains_key(conn_id) {
            return Err(GameError::DuplicateConnection);
        }
        Ok(())
    }

    pub async fn bind(&self, conn_id: &str, room_code: RoomCode, player_id: PlayerId) {
        self.connections.write().await.insert(
            conn_id.to_string(),
            Session {
                room_code,
                player_id,
            },
        );
    }

    pub async fn unbind(&self, conn_id: &str) -> Option<Session> {
        self.connections.write().await.remove(conn_id)
    }

    /// Drop every binding into the given room. Used when a room is deleted.
    pub async fn unbind_room(&self, room_code: &str) {
        self.connections
            .write()
            .await
            .retain(|_, session| session.room_code != room_code);
    }
}
