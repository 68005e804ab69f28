//! Binary asset upload.
//!
//! Dish photos arrive as inline base64 over the socket; the store turns them
//! into a URL the rest of the system treats as opaque content.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
    #[error("asset too large: {0} bytes (limit {1})")]
    TooLarge(usize, usize),
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store an uploaded blob and return a URL clients can render.
    async fn upload(&self, bytes: Vec<u8>, owner: &str) -> Result<String, AssetError>;
}

/// Keeps uploads inline as `data:` URLs. Good enough for a single-process
/// deployment; an object store fits behind the same trait.
pub struct InlineAssetStore {
    pub max_bytes: usize,
}

impl Default for InlineAssetStore {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

#[async_trait]
impl AssetStore for InlineAssetStore {
    async fn upload(&self, bytes: Vec<u8>, _owner: &str) -> Result<String, AssetError> {
        if bytes.len() > self.max_bytes {
            return Err(AssetError::TooLarge(bytes.len(), self.max_bytes));
        }
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes)))
    }
}

pub fn decode_image(payload: &str) -> Result<Vec<u8>, AssetError> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::InvalidPayload(e.to_string()))
}
