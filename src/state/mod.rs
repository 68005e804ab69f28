pub mod directory;
pub mod phase;
pub mod registry;
pub mod roster;
pub mod submission;
pub mod vote;

use crate::assets::{AssetStore, InlineAssetStore};
use crate::config::Config;
use crate::generate::{self, PromptGenerator};
use crate::protocol::ServerMessage;
use crate::store::{MemoryStore, Store};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};

/// What a bound connection resolves to.
#[derive(Debug, Clone)]
pub struct Session {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
}

/// One room's shared state: the record itself behind its per-room critical
/// section, and the fan-out channel every member connection subscribes to.
pub struct RoomHandle {
    pub room: Mutex<Room>,
    pub events: broadcast::Sender<ServerMessage>,
}

impl RoomHandle {
    pub fn new(room: Room) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            room: Mutex::new(room),
            events: tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }
}

/// Process-scoped coordinator state, passed explicitly into every component.
pub struct AppState {
    pub rooms: RwLock<HashMap<RoomCode, Arc<RoomHandle>>>,
    pub connections: RwLock<HashMap<ConnectionId, Session>>,
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn PromptGenerator>,
    pub assets: Arc<dyn AssetStore>,
    pub room_defaults: RoomConfig,
    pub idle_grace: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_defaults(RoomConfig::default())
    }

    pub fn with_defaults(room_defaults: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            store: Arc::new(MemoryStore::new()),
            generator: Arc::new(crate::generate::HousePrompts),
            assets: Arc::new(InlineAssetStore::default()),
            room_defaults,
            idle_grace: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut state = Self::with_defaults(config.room_defaults());
        state.generator = generate::from_config(config.generator_url.as_deref());
        state.idle_grace = Duration::from_secs(config.idle_grace_seconds);
        state
    }

    /// Persist the room record, using the version-checked write first.
    /// `prev_version` is the room's version before the mutation being
    /// persisted; under the per-room lock that is also the last version the
    /// store saw, so a mismatch means a first write.
    pub(crate) async fn persist(&self, prev_version: u64, room: &Room) {
        match self.store.update_room_if(prev_version, room).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.store.save_room(room).await {
                    tracing::warn!(code = %room.code, error = %e, "failed to persist room record");
                }
            }
            Err(e) => {
                tracing::warn!(code = %room.code, error = %e, "conditional room update failed");
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
