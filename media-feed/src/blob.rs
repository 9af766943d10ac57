//! Locally materialized media bytes behind revocable handles

use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const BLOB_SCHEME: &str = "blob:aura/";

struct Blob {
    bytes: Arc<Vec<u8>>,
    mime_type: String,
}

/// Registry of downloaded media, addressed by `blob:` locators
///
/// Entries live exactly as long as the [`BlobHandle`] that created them.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    entries: Arc<Mutex<HashMap<String, Blob>>>,
}

impl std::fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Blob>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `bytes` and returns the handle owning them
    pub fn create(&self, bytes: Vec<u8>, mime_type: &str) -> BlobHandle {
        let url = format!("{}{}", BLOB_SCHEME, ulid::Ulid::new());
        self.lock().insert(
            url.clone(),
            Blob {
                bytes: Arc::new(bytes),
                mime_type: mime_type.to_string(),
            },
        );
        log::debug!("Created blob {} ({})", url, mime_type);
        BlobHandle {
            url,
            registry: self.clone(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn bytes(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.lock().get(url).map(|blob| blob.bytes.clone())
    }

    /// Base64 data URL for rendering, `None` once revoked
    pub fn data_url(&self, url: &str) -> Option<String> {
        let guard = self.lock();
        let blob = guard.get(url)?;
        let encoded = general_purpose::STANDARD.encode(blob.bytes.as_slice());
        Some(format!("data:{};base64,{}", blob.mime_type, encoded))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn revoke(&self, url: &str) {
        if self.lock().remove(url).is_some() {
            log::debug!("Revoked blob {}", url);
        }
    }
}

/// Owning handle for one registry entry; releasing or dropping it revokes the locator
pub struct BlobHandle {
    url: String,
    registry: BlobRegistry,
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn data_url(&self) -> Option<String> {
        self.registry.data_url(&self.url)
    }

    /// Explicit release; equivalent to dropping the handle
    pub fn release(self) {}
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

impl std::fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlobHandle").field(&self.url).finish()
    }
}

impl PartialEq for BlobHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}
