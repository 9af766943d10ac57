//! Photo uploads: validation, object write, metadata row

use crate::backend::{collections, ObjectStorage, RecordStore};
use crate::error::MediaFeedError;
use crate::models::{MediaType, NewUserMedia};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Upload size ceiling, inclusive
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// A picked file, read fully into memory
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    /// Declared MIME type
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// File extension, falling back to the MIME subtype
    fn extension(&self) -> String {
        let from_name = Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty());
        let from_mime = self
            .content_type
            .split('/')
            .nth(1)
            .map(subtype_extension)
            .filter(|ext| !ext.is_empty());

        from_name
            .or(from_mime)
            .unwrap_or("bin")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase()
    }
}

/// Conventional file extension for a MIME subtype
fn subtype_extension(subtype: &str) -> &str {
    let subtype = subtype.split(';').next().unwrap_or_default().trim();
    match subtype.to_ascii_lowercase().as_str() {
        "jpeg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        "tiff" => "tif",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        _ => {
            // Drop a structured syntax suffix (`+xml`) and the `x-` prefix
            let base = subtype.split('+').next().unwrap_or_default();
            base.strip_prefix("x-").unwrap_or(base)
        }
    }
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// Stored locator of the new media
    pub url: String,
    /// Object path inside the bucket
    pub path: String,
}

/// Rejects files that are not images or exceed [`MAX_UPLOAD_BYTES`]
pub fn validate_upload(file: &UploadFile) -> Result<(), MediaFeedError> {
    if !file.content_type.starts_with("image/") {
        return Err(MediaFeedError::Validation(
            "Please select an image file".to_string(),
        ));
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(MediaFeedError::Validation(
            "File size must be less than 5MB".to_string(),
        ));
    }
    Ok(())
}

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp, strictly increasing within this process
fn next_stamp() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// Validates, stores and records a photo for a signed-in user
pub struct UploadCoordinator<S, O> {
    store: Arc<S>,
    storage: Arc<O>,
}

impl<S, O> Clone for UploadCoordinator<S, O> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S: RecordStore, O: ObjectStorage> UploadCoordinator<S, O> {
    pub fn new(store: Arc<S>, storage: Arc<O>) -> Self {
        Self { store, storage }
    }

    /// Uploads `file` under `{user_id}/{stamp}.{ext}` and inserts its metadata row
    ///
    /// Validation happens before any network call. A failed metadata insert
    /// leaves the stored object in place.
    pub async fn upload(
        &self,
        file: UploadFile,
        user_id: &Uuid,
    ) -> Result<UploadReceipt, MediaFeedError> {
        validate_upload(&file)?;

        let file_name = format!("{}.{}", next_stamp(), file.extension());
        let path = format!("{}/{}", user_id, file_name);
        log::info!("Uploading {} ({} bytes) to {}", file.name, file.size(), path);

        self.storage
            .put(&path, file.bytes, &file.content_type, false)
            .await
            .map_err(|e| {
                log::error!("Error uploading photo: {}", e);
                match e {
                    MediaFeedError::Storage(_) => e,
                    other => MediaFeedError::Storage(other.detail().to_string()),
                }
            })?;

        let url = self.storage.public_url(&path);

        let row = NewUserMedia {
            user_id: *user_id,
            url: url.clone(),
            media_type: MediaType::Image,
            thumbnail: None,
        };
        let record = serde_json::to_value(&row)
            .map_err(|e| MediaFeedError::Persist(format!("Failed to encode media row: {}", e)))?;

        self.store
            .insert(collections::USER_MEDIA, record)
            .await
            .map_err(|e| {
                log::error!("Error saving media row for {}: {}", path, e);
                match e {
                    MediaFeedError::Persist(_) => e,
                    other => MediaFeedError::Persist(other.detail().to_string()),
                }
            })?;

        log::info!("Uploaded photo {}", url);
        Ok(UploadReceipt { url, path })
    }
}
