//! Room directory: code generation, lookup and lifecycle of live rooms.

use super::{registry, AppState, RoomHandle};
use crate::error::GameError;
use crate::types::*;
use rand::Rng;
use std::sync::Arc;
use ulid::Ulid;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const CODE_LENGTH: usize = 4;
const MAX_CODE_ATTEMPTS: usize = 64;

fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// Normalize user-supplied input into canonical room code form.
pub fn normalize_code(raw: &str) -> Result<RoomCode, GameError> {
    let code = raw.trim().to_ascii_uppercase();
    if !is_valid_code(&code) {
        return Err(GameError::CodeInvalid(raw.to_string()));
    }
    Ok(code)
}

impl AppState {
    /// Create a room with the caller as host, bind their connection, and
    /// return the handle. The unused-code search runs under the directory
    /// write lock so concurrent creates cannot race into the same code.
    pub async fn create_room(
        &self,
        host_name: &str,
        conn_id: &str,
    ) -> Result<Arc<RoomHandle>, GameError> {
        let name = registry::validate_name(host_name)?;
        self.ensure_unbound(conn_id).await?;

        let mut rooms = self.rooms.write().await;
        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| generate_code())
            .find(|candidate| !rooms.contains_key(candidate))
            .ok_or_else(|| {
                tracing::error!("room code space exhausted after {MAX_CODE_ATTEMPTS} attempts");
                GameError::Internal("could not allocate a room code".to_string())
            })?;

        let host = Player {
            id: Ulid::new().to_string(),
            name,
            is_host: true,
            is_connected: true,
            join_order: 0,
        };
        let host_id = host.id.clone();
        let room = Room::new(code.clone(), host, self.room_defaults);
        let handle = Arc::new(RoomHandle::new(room));
        rooms.insert(code.clone(), handle.clone());
        drop(rooms);

        self.bind(conn_id, code.clone(), host_id).await;
        tracing::info!(code = %code, "room created");
        Ok(handle)
    }

    pub async fn find_room(&self, code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Remove a room from the directory, sweep its connection bindings and
    /// delete the persisted record. Returns whether the room existed.
    pub async fn delete_room(&self, code: &str) -> bool {
        let removed = self.rooms.write().await.remove(code).is_some();
        if removed {
            self.unbind_room(code).await;
            if let Err(e) = self.store.delete_room(code).await {
                tracing::warn!(code = %code, error = %e, "failed to delete room record");
            }
            tracing::info!(code = %code, "room deleted");
        }
        removed
    }
}
