use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Variant tag of a media record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// Named renditions of a product picture (`model1`, `model2`, ...)
///
/// Record shapes are open: any rendition name may appear. Only
/// [`Renditions::PRIMARY`] is inspected by the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Renditions(BTreeMap<String, Option<String>>);

impl Renditions {
    /// Rendition required for a product to appear in the feed
    pub const PRIMARY: &'static str = "model1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.insert(name, url);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.0.insert(name.into(), Some(url.into()));
    }

    /// Looks up a rendition; empty or null locators count as absent
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|url| url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn primary(&self) -> Option<&str> {
        self.get(Self::PRIMARY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A product or user media record as fetched from the record store
///
/// Records are never mutated after fetching; the feed replaces whole arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    // Product rows carry no type column; they are always pictures
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Renditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn new(id: i64, media_type: MediaType, url: impl Into<String>) -> Self {
        Self {
            id,
            media_type,
            url: url.into(),
            thumbnail: None,
            name: None,
            price: None,
            images: None,
            user_id: None,
            created_at: None,
        }
    }

    /// Product feed eligibility: a non-empty `model1` rendition is present
    pub fn is_feed_eligible(&self) -> bool {
        self.images
            .as_ref()
            .and_then(Renditions::primary)
            .is_some()
    }

    pub fn rendition(&self, name: &str) -> Option<&str> {
        self.images.as_ref().and_then(|images| images.get(name))
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }
}

/// Metadata row written after a successful photo upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUserMedia {
    pub user_id: Uuid,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Selects which query backs the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedMode {
    /// Public product media
    #[default]
    AfProducts,
    /// The signed-in user's own uploads
    MyPhotos,
}

impl FeedMode {
    pub fn requires_identity(&self) -> bool {
        matches!(self, FeedMode::MyPhotos)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedMode::AfProducts => "A&F",
            FeedMode::MyPhotos => "My Photos",
        }
    }
}

/// The signed-in user as seen by the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            email: None,
            display_name: None,
            avatar_url: None,
        }
    }

    /// Avatar placeholder letter
    pub fn initial(&self) -> char {
        self.email
            .as_deref()
            .and_then(|email| email.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

/// Identity transitions pushed by the identity provider
#[derive(Debug, Clone, PartialEq, Default)]
pub enum IdentityState {
    /// Initial session state not resolved yet
    #[default]
    Pending,
    SignedOut,
    SignedIn(Identity),
}

impl IdentityState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, IdentityState::Pending)
    }
}

impl From<Option<Identity>> for IdentityState {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => IdentityState::SignedIn(identity),
            None => IdentityState::SignedOut,
        }
    }
}
