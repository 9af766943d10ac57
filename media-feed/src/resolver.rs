//! Authenticated media resolution
//!
//! Public locators are rendered as-is. Locators that point into protected
//! object storage are downloaded with the session's credentials and turned
//! into a revocable local handle. A failed download degrades to the raw
//! locator, which may then fail to render.

use crate::backend::ObjectStorage;
use crate::blob::{BlobHandle, BlobRegistry};
use crate::error::MediaFeedError;
use crate::models::{MediaItem, MediaType};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a display element should render
#[derive(Debug, PartialEq)]
pub enum ResolvedSource {
    /// Locator used unchanged (public URL, video, or fallback)
    Direct(String),
    /// Downloaded bytes behind a local handle
    Blob(BlobHandle),
}

impl ResolvedSource {
    /// The locator of this source (`blob:` for handles)
    pub fn src(&self) -> &str {
        match self {
            ResolvedSource::Direct(url) => url,
            ResolvedSource::Blob(handle) => handle.url(),
        }
    }

    /// A value an image element can load directly
    pub fn display_src(&self) -> Option<String> {
        match self {
            ResolvedSource::Direct(url) => Some(url.clone()),
            ResolvedSource::Blob(handle) => handle.data_url(),
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, ResolvedSource::Blob(_))
    }
}

/// Decides the retrieval strategy for media locators
pub struct MediaResolver<O> {
    storage: Arc<O>,
    blobs: BlobRegistry,
}

impl<O> Clone for MediaResolver<O> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            blobs: self.blobs.clone(),
        }
    }
}

impl<O: ObjectStorage> MediaResolver<O> {
    pub fn new(storage: Arc<O>, blobs: BlobRegistry) -> Self {
        Self { storage, blobs }
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Resolves a locator; never fails
    pub async fn resolve(&self, url: &str) -> ResolvedSource {
        if !self.storage.is_protected(url) {
            return ResolvedSource::Direct(url.to_string());
        }

        match self.fetch_authenticated(url).await {
            Ok(handle) => ResolvedSource::Blob(handle),
            Err(e) => {
                // Protected locators are not publicly readable, so this
                // fallback usually renders as a broken image.
                log::error!("Error fetching authenticated image {}: {}", url, e);
                ResolvedSource::Direct(url.to_string())
            }
        }
    }

    /// Images go through [`resolve`](Self::resolve); videos stream from their locator
    pub async fn resolve_item(&self, item: &MediaItem) -> ResolvedSource {
        match item.media_type {
            MediaType::Image => self.resolve(&item.url).await,
            MediaType::Video => ResolvedSource::Direct(item.url.clone()),
        }
    }

    /// Resolves `item` into `slot` unless the slot moved on meanwhile
    pub async fn resolve_into(&self, slot: &MediaSlot, item: &MediaItem) -> bool {
        let ticket = slot.begin();
        let source = self.resolve_item(item).await;
        slot.install(ticket, source)
    }

    async fn fetch_authenticated(&self, url: &str) -> Result<BlobHandle, MediaFeedError> {
        let path = self.storage.object_path(url)?;
        let bytes = self.storage.download(&path).await?;
        let mime_type = sniff_mime_type(&bytes);
        Ok(self.blobs.create(bytes, mime_type))
    }
}

/// MIME type from the leading bytes of an image
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    current: Option<ResolvedSource>,
}

/// Proof that a resolution was started for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    generation: u64,
}

/// The resolved source of one display element
///
/// Starting a resolution supersedes any earlier one: results carrying an
/// older ticket are discarded and their handles released.
#[derive(Clone, Default)]
pub struct MediaSlot {
    state: Arc<Mutex<SlotState>>,
}

impl MediaSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new resolution and releases the current source
    pub fn begin(&self) -> SlotTicket {
        let (ticket, previous) = {
            let mut state = self.lock();
            state.generation += 1;
            let ticket = SlotTicket {
                generation: state.generation,
            };
            (ticket, state.current.take())
        };
        drop(previous);
        ticket
    }

    /// Installs `source` if `ticket` is still the latest; returns whether it was installed
    pub fn install(&self, ticket: SlotTicket, source: ResolvedSource) -> bool {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            drop(state);
            log::debug!("Discarding stale media resolution for {}", source.src());
            drop(source);
            return false;
        }
        let previous = state.current.replace(source);
        drop(state);
        drop(previous);
        true
    }

    pub fn current_src(&self) -> Option<String> {
        self.lock().current.as_ref().map(|source| source.src().to_string())
    }

    pub fn display_src(&self) -> Option<String> {
        self.lock().current.as_ref().and_then(ResolvedSource::display_src)
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Unmount: invalidates in-flight work and releases the current source
    pub fn clear(&self) {
        let previous = {
            let mut state = self.lock();
            state.generation += 1;
            state.current.take()
        };
        drop(previous);
    }
}
