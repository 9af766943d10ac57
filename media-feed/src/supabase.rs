//! Hosted backend over HTTP: PostgREST records and Storage objects
//!
//! One explicitly constructed [`SupabaseClient`] is shared by the record
//! store, the object storage and the auth service. The access token of the
//! current session is stored on the client and applied to every request.

use crate::backend::{Filter, ObjectStorage, Order, RecordStore};
use crate::error::MediaFeedError;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

fn default_bucket() -> String {
    "user-images".to_string()
}

fn default_storage_marker() -> String {
    "supabase.co/storage".to_string()
}

/// Connection settings of the hosted project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    /// Bucket holding user uploads
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Substring identifying protected storage locators
    #[serde(default = "default_storage_marker")]
    pub storage_marker: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            bucket: default_bucket(),
            storage_marker: default_storage_marker(),
        }
    }

    pub fn validate(&self) -> Result<(), MediaFeedError> {
        if self.url.trim().is_empty() || self.anon_key.trim().is_empty() {
            return Err(MediaFeedError::Config(
                "Missing Supabase credentials".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP client for one hosted project
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    config: Arc<SupabaseConfig>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("url", &self.config.url)
            .field("bucket", &self.config.bucket)
            .finish()
    }
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, MediaFeedError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .user_agent("Aura/0.1.0")
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| MediaFeedError::Config(format!("Client build failed: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Installs or clears the session token used for authenticated calls
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token;
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Absolute URL for a path below the project URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Adds the project key and the session (or anonymous) bearer token
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .access_token()
            .unwrap_or_else(|| self.config.anon_key.clone());
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    fn object_endpoint(&self, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/{}/{}", self.config.bucket, path))
    }
}

fn filter_param(filter: &Filter) -> Option<(String, String)> {
    match filter {
        Filter::All => None,
        Filter::Eq(column, value) => {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((column.clone(), format!("eq.{}", value)))
        }
    }
}

fn order_param(order: &Order) -> String {
    let direction = if order.ascending { "asc" } else { "desc" };
    format!("{}.{}", order.column, direction)
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.is_empty() => format!("{}: {}", status, body),
        _ => status.to_string(),
    }
}

impl RecordStore for SupabaseClient {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: &Order,
    ) -> Result<Vec<Value>, MediaFeedError> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), order_param(order)),
        ];
        params.extend(filter_param(filter));

        let response = self
            .authorize(self.http.get(self.endpoint(&format!("rest/v1/{}", collection))))
            .query(&params)
            .send()
            .await
            .map_err(|e| MediaFeedError::Retrieval(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaFeedError::Retrieval(error_body(response).await));
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| MediaFeedError::Retrieval(format!("Failed to parse response: {}", e)))
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<(), MediaFeedError> {
        let response = self
            .authorize(self.http.post(self.endpoint(&format!("rest/v1/{}", collection))))
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await
            .map_err(|e| MediaFeedError::Persist(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaFeedError::Persist(error_body(response).await));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Value,
        conflict_key: &str,
    ) -> Result<(), MediaFeedError> {
        let response = self
            .authorize(self.http.post(self.endpoint(&format!("rest/v1/{}", collection))))
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&record)
            .send()
            .await
            .map_err(|e| MediaFeedError::Persist(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaFeedError::Persist(error_body(response).await));
        }
        Ok(())
    }
}

impl ObjectStorage for SupabaseClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), MediaFeedError> {
        let response = self
            .authorize(self.http.post(self.object_endpoint(path)))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(|e| MediaFeedError::Storage(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaFeedError::Storage(error_body(response).await));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            self.config.bucket, path
        ))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, MediaFeedError> {
        let response = self
            .authorize(self.http.get(self.object_endpoint(path)))
            .send()
            .await
            .map_err(|e| MediaFeedError::Storage(format!("Download request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaFeedError::Storage(error_body(response).await));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| MediaFeedError::Storage(format!("Download failed: {}", e)))
    }

    fn is_protected(&self, url: &str) -> bool {
        url.contains(&self.config.storage_marker)
    }

    fn object_path(&self, url: &str) -> Result<String, MediaFeedError> {
        let separator = format!("/{}/", self.config.bucket);
        let parts: Vec<&str> = url.split(separator.as_str()).collect();
        match parts.as_slice() {
            [_, path] if !path.is_empty() => Ok(path.to_string()),
            _ => Err(MediaFeedError::Storage(
                "Invalid storage URL format".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig::new("https://demo.supabase.co/", "anon-key")).unwrap()
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let result = SupabaseClient::new(SupabaseConfig::new("", "key"));
        assert!(matches!(result, Err(MediaFeedError::Config(_))));
    }

    #[test]
    fn test_public_url_and_object_path_agree() {
        let client = client();
        let url = client.public_url("user-1/100.jpg");
        assert_eq!(
            url,
            "https://demo.supabase.co/storage/v1/object/public/user-images/user-1/100.jpg"
        );
        assert!(client.is_protected(&url));
        assert_eq!(client.object_path(&url).unwrap(), "user-1/100.jpg");
    }

    #[test]
    fn test_object_path_requires_single_bucket_segment() {
        let client = client();
        assert!(client
            .object_path("https://demo.supabase.co/storage/v1/object/public/avatars/a.jpg")
            .is_err());
        assert!(client
            .object_path("https://x.supabase.co/storage/v1/object/public/user-images/a/user-images/b.jpg")
            .is_err());
        assert!(!client.is_protected("https://img.abercrombie.com/p/1.jpg"));
    }

    #[test]
    fn test_query_params() {
        assert_eq!(filter_param(&Filter::All), None);
        assert_eq!(
            filter_param(&Filter::eq("user_id", "abc")),
            Some(("user_id".to_string(), "eq.abc".to_string()))
        );
        assert_eq!(
            filter_param(&Filter::eq("id", json!(7))),
            Some(("id".to_string(), "eq.7".to_string()))
        );
        assert_eq!(order_param(&Order::desc("created_at")), "created_at.desc");
    }

    #[test]
    fn test_access_token_is_shared_between_clones() {
        let client = client();
        let clone = client.clone();
        client.set_access_token(Some("session".to_string()));
        assert_eq!(clone.access_token().as_deref(), Some("session"));
        clone.set_access_token(None);
        assert_eq!(client.access_token(), None);
    }
}
