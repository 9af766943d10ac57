//! # Media Feed
//!
//! Core of the Aura media feed: a shuffled feed of product media or a
//! user's own photo uploads, backed by a hosted record store, object
//! storage and identity provider.
//!
//! This crate provides:
//! - Fisher–Yates shuffling of fetched feed items
//! - Product and user media retrieval with ordering guarantees
//! - Authenticated media resolution into revocable local handles
//! - The feed state machine with last-request-wins load sequencing
//! - Photo upload validation, storage and metadata recording
//! - The one-shot migration of legacy JSON collections and images
//!
//! ## Collaborators
//!
//! Persistence, binary storage and authentication are reached through the
//! [`RecordStore`], [`ObjectStorage`] and [`IdentityProvider`] traits. Two
//! implementations ship with the crate: the hosted backend (feature
//! `supabase`) and a local SQLite + filesystem backend in [`local`].
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use media_feed::{FeedController, FeedMode, MediaRepository};
//!
//! let controller = FeedController::new(MediaRepository::new(store));
//! if let Some(load) = controller.set_mode(FeedMode::MyPhotos) {
//!     tokio::spawn(load.run());
//! }
//! ```

pub mod backend;
pub mod blob;
pub mod error;
pub mod feed;
pub mod local;
pub mod migration;
pub mod models;
pub mod profile;
pub mod repository;
pub mod resolver;
pub mod shuffle;
pub mod upload;

#[cfg(feature = "supabase")]
pub mod supabase;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{collections, Filter, IdentityProvider, ObjectStorage, Order, RecordStore};
pub use blob::{BlobHandle, BlobRegistry};
pub use error::MediaFeedError;
pub use feed::{filter_eligible, FeedController, FeedLoad, FeedSnapshot, FeedState};
pub use local::{LocalIdentityProvider, LocalObjectStorage, LocalRecordStore};
pub use migration::{LegacyMediaItem, MigrationReport, Migrator, DEMO_USER_ID};
pub use models::{FeedMode, Identity, IdentityState, MediaItem, MediaType, NewUserMedia, Renditions};
pub use profile::{upsert_profile, ProfileRecord};
pub use repository::MediaRepository;
pub use resolver::{MediaResolver, MediaSlot, ResolvedSource, SlotTicket};
pub use shuffle::{shuffle, shuffle_with};
pub use upload::{validate_upload, UploadCoordinator, UploadFile, UploadReceipt, MAX_UPLOAD_BYTES};

#[cfg(feature = "supabase")]
pub use supabase::{SupabaseClient, SupabaseConfig};
