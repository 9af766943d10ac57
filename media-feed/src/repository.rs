use crate::backend::{collections, Filter, Order, RecordStore};
use crate::error::MediaFeedError;
use crate::models::MediaItem;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Read-only access to product and user media records
///
/// Every call goes to the store; nothing is cached.
pub struct MediaRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for MediaRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: RecordStore> MediaRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// All product records, ascending by id
    pub async fn fetch_products(&self) -> Result<Vec<MediaItem>, MediaFeedError> {
        let rows = self
            .store
            .query(collections::PRODUCTS, &Filter::All, &Order::asc("id"))
            .await
            .map_err(|e| {
                log::error!("Error fetching products: {}", e);
                e
            })?;

        let mut items = decode_rows(rows)?;
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    /// Records owned by `user_id`, newest first
    pub async fn fetch_user_media(&self, user_id: &Uuid) -> Result<Vec<MediaItem>, MediaFeedError> {
        let rows = self
            .store
            .query(
                collections::USER_MEDIA,
                &Filter::eq("user_id", user_id.to_string()),
                &Order::desc("created_at"),
            )
            .await
            .map_err(|e| {
                log::error!("Error fetching user media: {}", e);
                e
            })?;

        let mut items = decode_rows(rows)?;

        let before = items.len();
        items.retain(|item| item.user_id.as_ref() == Some(user_id));
        if items.len() != before {
            log::warn!(
                "Dropped {} user media records not owned by {}",
                before - items.len(),
                user_id
            );
        }

        // Stable, so equal timestamps keep the store's order
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<MediaItem>, MediaFeedError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<MediaItem>(row)
                .map_err(|e| MediaFeedError::Retrieval(format!("Malformed media record: {}", e)))
        })
        .collect()
}
