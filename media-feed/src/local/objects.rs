use crate::backend::ObjectStorage;
use crate::error::MediaFeedError;
use std::path::{Component, Path, PathBuf};

const SCHEME: &str = "local-storage://";

/// Object storage in a directory tree, one subdirectory per bucket
///
/// Every locator it hands out is treated as protected so that the resolver
/// reads objects through [`ObjectStorage::download`].
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn url_prefix(&self) -> String {
        format!("{}{}/", SCHEME, self.bucket)
    }

    /// Absolute file path for an object path; rejects escapes from the bucket
    fn file_path(&self, path: &str) -> Result<PathBuf, MediaFeedError> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(MediaFeedError::Storage(format!("Invalid object path: {}", path)));
        }
        Ok(self.root.join(&self.bucket).join(relative))
    }
}

impl ObjectStorage for LocalObjectStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        upsert: bool,
    ) -> Result<(), MediaFeedError> {
        let file_path = self.file_path(path)?;
        if file_path.exists() && !upsert {
            return Err(MediaFeedError::Storage(format!(
                "The resource already exists: {}",
                path
            )));
        }
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MediaFeedError::Storage(format!("Cannot create directory: {}", e)))?;
        }
        std::fs::write(&file_path, &bytes)
            .map_err(|e| MediaFeedError::Storage(format!("Cannot write {}: {}", path, e)))?;
        log::debug!("Stored {} bytes at {}", bytes.len(), file_path.display());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.url_prefix(), path)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, MediaFeedError> {
        let file_path = self.file_path(path)?;
        std::fs::read(&file_path)
            .map_err(|e| MediaFeedError::Storage(format!("Cannot read {}: {}", path, e)))
    }

    fn is_protected(&self, url: &str) -> bool {
        url.starts_with(SCHEME)
    }

    fn object_path(&self, url: &str) -> Result<String, MediaFeedError> {
        match url.strip_prefix(&self.url_prefix()) {
            Some(path) if !path.is_empty() => Ok(path.to_string()),
            _ => Err(MediaFeedError::Storage(
                "Invalid storage URL format".to_string(),
            )),
        }
    }
}
