use crate::backend::{collections, RecordStore};
use crate::error::MediaFeedError;
use crate::models::Identity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `users` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl ProfileRecord {
    /// Username is the display name, else the email's local part, else "User"
    pub fn from_identity(identity: &Identity) -> Self {
        let username = identity
            .display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                identity
                    .email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or("User")
            .to_string();

        Self {
            id: identity.id,
            username,
            avatar_url: identity.avatar_url.clone(),
        }
    }
}

/// Idempotently writes the profile row for `identity`, keyed on `id`
pub async fn upsert_profile<S: RecordStore + ?Sized>(
    store: &S,
    identity: &Identity,
) -> Result<(), MediaFeedError> {
    let profile = ProfileRecord::from_identity(identity);
    let record = serde_json::to_value(&profile)
        .map_err(|e| MediaFeedError::Profile(format!("Failed to encode profile: {}", e)))?;

    store
        .upsert(collections::USERS, record, "id")
        .await
        .map_err(|e| MediaFeedError::Profile(e.detail().to_string()))?;

    log::debug!("Profile upserted for {} as {}", profile.id, profile.username);
    Ok(())
}
