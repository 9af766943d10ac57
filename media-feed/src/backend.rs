//! Contracts of the external collaborators
//!
//! The feed core never talks to a backend directly. Record store, object
//! storage and identity provider are passed in explicitly, which keeps the
//! core independent of the hosted service and lets tests substitute doubles.

use crate::error::MediaFeedError;
use crate::models::{Identity, IdentityState};
use serde_json::Value;
use std::future::Future;
use tokio::sync::watch;

/// Collection names used by the feed
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const USER_MEDIA: &str = "user_media";
    pub const USERS: &str = "users";
}

/// Row filter for record store queries
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Column equals value
    Eq(String, Value),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    /// Evaluates the filter against a JSON record
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(column, value) => record.get(column) == Some(value),
        }
    }
}

/// Sort order for record store queries
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Relational record store
///
/// `query` fails with [`MediaFeedError::Retrieval`], writes fail with
/// [`MediaFeedError::Persist`].
pub trait RecordStore: Send + Sync {
    fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: &Order,
    ) -> impl Future<Output = Result<Vec<Value>, MediaFeedError>> + Send;

    fn insert(
        &self,
        collection: &str,
        record: Value,
    ) -> impl Future<Output = Result<(), MediaFeedError>> + Send;

    /// Inserts or overwrites the row whose `conflict_key` column matches
    fn upsert(
        &self,
        collection: &str,
        record: Value,
        conflict_key: &str,
    ) -> impl Future<Output = Result<(), MediaFeedError>> + Send;
}

/// Binary object storage with protected (authenticated) reads
///
/// All failures are [`MediaFeedError::Storage`].
pub trait ObjectStorage: Send + Sync {
    fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> impl Future<Output = Result<(), MediaFeedError>> + Send;

    /// Durable locator for an object
    fn public_url(&self, path: &str) -> String;

    /// Authenticated read using the caller's session credentials
    fn download(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, MediaFeedError>> + Send;

    /// Whether a locator points into this protected storage
    fn is_protected(&self, url: &str) -> bool;

    /// Extracts the object path from a protected locator
    fn object_path(&self, url: &str) -> Result<String, MediaFeedError>;
}

/// Source of identity transitions
pub trait IdentityProvider: Send + Sync {
    /// Stream of identity states; the current value is the latest state
    fn subscribe(&self) -> watch::Receiver<IdentityState>;

    /// Idempotently upserts the profile row for `identity`
    ///
    /// Fails with [`MediaFeedError::Profile`].
    fn ensure_profile(
        &self,
        identity: &Identity,
    ) -> impl Future<Output = Result<(), MediaFeedError>> + Send;
}
