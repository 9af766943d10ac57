//! One-shot migration of the legacy JSON collections and image directory
//!
//! Every write is an upsert so repeated runs converge instead of
//! duplicating rows or objects. Failures are per item: they are logged,
//! counted and never abort a step.

use crate::backend::{collections, ObjectStorage, RecordStore};
use crate::error::MediaFeedError;
use crate::models::{MediaType, Renditions};
use crate::resolver::sniff_mime_type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Identity that owns all migrated user media
pub const DEMO_USER_ID: &str = "0d3667cf-df5a-4a5d-a837-efadd140b2ae";

/// Locator prefix of images in the legacy static build
pub const LEGACY_IMAGE_PREFIX: &str = "/aura/images/user_images/";

/// A record of the legacy `media.json` / `user_media.json` files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMediaItem {
    pub id: i64,
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
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Renditions>,
}

#[derive(Serialize)]
struct ProductRow<'a> {
    id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<&'a str>,
    url: &'a str,
    images: Renditions,
}

#[derive(Serialize)]
struct UserMediaRow<'a> {
    id: i64,
    user_id: Uuid,
    url: &'a str,
    #[serde(rename = "type")]
    media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<&'a str>,
}

/// Success and failure counts of one migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl MigrationReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} successful, {} errors", self.succeeded, self.failed)
    }
}

/// Reads a legacy JSON collection
pub fn load_items(path: &Path) -> Result<Vec<LegacyMediaItem>, MediaFeedError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MediaFeedError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| MediaFeedError::Config(format!("Cannot parse {}: {}", path.display(), e)))
}

/// Copies legacy data into a record store and object storage
pub struct Migrator<S, O> {
    store: Arc<S>,
    storage: Arc<O>,
    user_id: Uuid,
}

impl<S: RecordStore, O: ObjectStorage> Migrator<S, O> {
    pub fn new(store: Arc<S>, storage: Arc<O>, user_id: Uuid) -> Self {
        Self {
            store,
            storage,
            user_id,
        }
    }

    pub fn user_id(&self) -> &Uuid {
        &self.user_id
    }

    /// Upserts product records by `id`; missing renditions become `{}`
    pub async fn migrate_products(&self, items: &[LegacyMediaItem]) -> MigrationReport {
        log::info!("Migrating {} products", items.len());
        let mut report = MigrationReport::default();

        for item in items {
            let row = ProductRow {
                id: item.id,
                name: item.name.as_deref(),
                price: item.price.as_deref(),
                gender: item.gender.as_deref(),
                url: &item.url,
                images: item.images.clone().unwrap_or_default(),
            };
            match self.upsert(collections::PRODUCTS, &row).await {
                Ok(()) => {
                    report.succeeded += 1;
                    if report.succeeded % 10 == 0 {
                        log::info!("Products: {}/{}", report.succeeded, items.len());
                    }
                }
                Err(e) => {
                    log::error!("Error inserting product {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("Products migration complete: {}", report);
        report
    }

    /// Uploads every `*.jpg` in `dir` to `{user_id}/{filename}`
    ///
    /// Returns the report and a map from legacy locator to new public URL.
    /// Only an unreadable directory fails the step as a whole.
    pub async fn upload_user_images(
        &self,
        dir: &Path,
    ) -> Result<(MigrationReport, HashMap<String, String>), MediaFeedError> {
        let mut files: Vec<String> = std::fs::read_dir(dir)
            .map_err(|e| MediaFeedError::Config(format!("Cannot read {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".jpg"))
            .collect();
        files.sort();
        log::info!("Found {} images to upload", files.len());

        let mut report = MigrationReport::default();
        let mut url_map = HashMap::new();

        for file_name in &files {
            let bytes = match std::fs::read(dir.join(file_name)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("Error reading {}: {}", file_name, e);
                    report.failed += 1;
                    continue;
                }
            };

            let content_type = match sniff_mime_type(&bytes) {
                "application/octet-stream" => "image/jpeg",
                sniffed => sniffed,
            };
            let path = format!("{}/{}", self.user_id, file_name);

            if let Err(e) = self.storage.put(&path, bytes, content_type, true).await {
                log::error!("Error uploading {}: {}", file_name, e);
                report.failed += 1;
                continue;
            }

            url_map.insert(
                format!("{}{}", LEGACY_IMAGE_PREFIX, file_name),
                self.storage.public_url(&path),
            );
            report.succeeded += 1;
            if report.succeeded % 5 == 0 {
                log::info!("Images: {}/{}", report.succeeded, files.len());
            }
        }

        log::info!("Image upload complete: {}", report);
        Ok((report, url_map))
    }

    /// Upserts user media rows for the migration identity, rewriting legacy locators
    pub async fn migrate_user_media(
        &self,
        items: &[LegacyMediaItem],
        url_map: &HashMap<String, String>,
    ) -> MigrationReport {
        log::info!("Migrating {} user media items", items.len());
        let mut report = MigrationReport::default();

        for item in items {
            let url = url_map.get(&item.url).unwrap_or(&item.url);
            let row = UserMediaRow {
                id: item.id,
                user_id: self.user_id,
                url,
                media_type: item.media_type,
                thumbnail: item.thumbnail.as_deref(),
            };
            match self.upsert(collections::USER_MEDIA, &row).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    log::error!("Error inserting user media {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }

        log::info!("User media migration complete: {}", report);
        report
    }

    async fn upsert<T: Serialize>(&self, collection: &str, row: &T) -> Result<(), MediaFeedError> {
        let record = serde_json::to_value(row)
            .map_err(|e| MediaFeedError::Persist(format!("Failed to encode row: {}", e)))?;
        self.store.upsert(collection, record, "id").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingStorage, RecordingStore, JPEG_BYTES};
    use serde_json::json;

    fn migrator() -> (
        Arc<RecordingStore>,
        Arc<RecordingStorage>,
        Migrator<RecordingStore, RecordingStorage>,
    ) {
        let store = Arc::new(RecordingStore::new());
        let storage = Arc::new(RecordingStorage::new());
        let user_id = Uuid::parse_str(DEMO_USER_ID).unwrap();
        let migrator = Migrator::new(store.clone(), storage.clone(), user_id);
        (store, storage, migrator)
    }

    fn legacy(value: serde_json::Value) -> LegacyMediaItem {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_products_are_upserted_with_default_images() {
        let (store, _storage, migrator) = migrator();
        let items = vec![
            legacy(json!({ "id": 1, "url": "/p/1.jpg", "name": "Tee", "gender": "men",
                           "images": { "model1": "/p/1-m1.jpg" } })),
            legacy(json!({ "id": 2, "url": "/p/2.jpg" })),
        ];

        let first = migrator.migrate_products(&items).await;
        let second = migrator.migrate_products(&items).await;
        assert_eq!(first, MigrationReport { succeeded: 2, failed: 0 });
        assert_eq!(second, first);

        let rows = store.rows(collections::PRODUCTS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["images"], json!({}));
        assert_eq!(rows[0]["gender"], "men");
    }

    #[tokio::test]
    async fn test_failed_rows_are_counted() {
        let (store, _storage, migrator) = migrator();
        store.fail_writes();
        let items = vec![legacy(json!({ "id": 1, "url": "/p/1.jpg" }))];

        let report = migrator.migrate_products(&items).await;
        assert_eq!(report, MigrationReport { succeeded: 0, failed: 1 });
        assert_eq!(report.to_string(), "0 successful, 1 errors");
    }

    #[tokio::test]
    async fn test_images_upload_and_rewrite_user_media() {
        let (store, storage, migrator) = migrator();
        let dir = std::env::temp_dir().join(format!("aura-migration-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.jpg"), JPEG_BYTES).unwrap();
        std::fs::write(dir.join("a.jpg"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.join("notes.txt"), "skip me").unwrap();

        let (report, url_map) = migrator.upload_user_images(&dir).await.unwrap();
        assert_eq!(report, MigrationReport { succeeded: 2, failed: 0 });

        let puts = storage.puts();
        assert_eq!(
            puts,
            vec![
                (format!("{}/a.jpg", DEMO_USER_ID), "image/jpeg".to_string(), true),
                (format!("{}/b.jpg", DEMO_USER_ID), "image/jpeg".to_string(), true),
            ]
        );

        let items = vec![
            legacy(json!({ "id": 1, "type": "image", "url": "/aura/images/user_images/a.jpg" })),
            legacy(json!({ "id": 2, "type": "video", "url": "https://cdn.example.com/v.mp4",
                           "thumbnail": "https://cdn.example.com/v.jpg" })),
        ];
        let report = migrator.migrate_user_media(&items, &url_map).await;
        assert_eq!(report.succeeded, 2);

        let rows = store.rows(collections::USER_MEDIA);
        assert_eq!(rows[0]["url"], url_map["/aura/images/user_images/a.jpg"]);
        assert_eq!(rows[0]["user_id"], DEMO_USER_ID);
        assert_eq!(rows[1]["url"], "https://cdn.example.com/v.mp4");
        assert_eq!(rows[1]["type"], "video");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_image_dir_fails_step() {
        let (_store, _storage, migrator) = migrator();
        let result = migrator
            .upload_user_images(Path::new("/nonexistent/aura/images"))
            .await;
        assert!(matches!(result, Err(MediaFeedError::Config(_))));
    }
}
