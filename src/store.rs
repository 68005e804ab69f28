//! Abstract room-record persistence.
//!
//! The in-memory room is authoritative; the store is a thin collaborator
//! whose one required primitive is the atomic conditional update used as the
//! basis for version-checked writes.

use crate::types::Room;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_room(&self, room: &Room) -> Result<(), StoreError>;
    async fn find_room(&self, code: &str) -> Result<Option<Room>, StoreError>;
    async fn delete_room(&self, code: &str) -> Result<(), StoreError>;
    /// Atomic conditional update: writes only if the stored record's version
    /// matches `expected_version`. Returns whether the write happened.
    async fn update_room_if(&self, expected_version: u64, room: &Room) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_room(&self, room: &Room) -> Result<(), StoreError> {
        self.rooms
            .write()
            .await
            .insert(room.code.clone(), room.clone());
        Ok(())
    }

    async fn find_room(&self, code: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().await.get(code).cloned())
    }

    async fn delete_room(&self, code: &str) -> Result<(), StoreError> {
        self.rooms.write().await.remove(code);
        Ok(())
    }

    async fn update_room_if(&self, expected_version: u64, room: &Room) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get(&room.code) {
            Some(existing) if existing.version == expected_version => {
                rooms.insert(room.code.clone(), room.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
