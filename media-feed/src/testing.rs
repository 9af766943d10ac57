//! Recording collaborator doubles shared by the unit tests

use crate::backend::{Filter, IdentityProvider, ObjectStorage, Order, RecordStore};
use crate::error::MediaFeedError;
use crate::models::{Identity, IdentityState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};
use uuid::Uuid;

/// Smallest byte sequence recognised as JPEG
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

const STORAGE_BASE: &str = "https://demo.supabase.co/storage/v1/object/public/user-images/";

pub fn protected_url(path: &str) -> String {
    format!("{}{}", STORAGE_BASE, path)
}

pub fn identity() -> Identity {
    Identity {
        id: Uuid::parse_str("0d3667cf-df5a-4a5d-a837-efadd140b2ae").unwrap(),
        email: Some("demo@aura.app".to_string()),
        display_name: None,
        avatar_url: None,
    }
}

pub fn product_row(id: i64, eligible: bool) -> Value {
    let images = if eligible {
        json!({ "model1": format!("https://cdn.example.com/{}-m1.jpg", id) })
    } else {
        json!({})
    };
    json!({
        "id": id,
        "name": format!("Product {}", id),
        "price": "$50",
        "url": format!("https://cdn.example.com/{}.jpg", id),
        "images": images,
    })
}

pub fn user_media_row(id: i64, owner: &Uuid, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": owner.to_string(),
        "type": "image",
        "url": protected_url(&format!("{}/{}.jpg", owner, id)),
        "created_at": created_at,
    })
}

/// In-memory record store that records every call
#[derive(Default)]
pub struct RecordingStore {
    rows: Mutex<HashMap<String, Vec<Value>>>,
    queries: Mutex<Vec<String>>,
    inserts: Mutex<Vec<(String, Value)>>,
    upserts: Mutex<Vec<(String, Value, String)>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fail_queries: AtomicBool,
    fail_writes: AtomicBool,
    ignore_filters: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        self.rows
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Returns every row of a collection regardless of the filter
    pub fn ignore_filters(&self) {
        self.ignore_filters.store(true, Ordering::SeqCst);
    }

    /// Holds queries on `collection` until the returned gate is notified
    pub fn gate(&self, collection: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(collection.to_string(), gate.clone());
        gate
    }

    pub fn query_count(&self, collection: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == collection)
            .count()
    }

    pub fn inserts(&self) -> Vec<(String, Value)> {
        self.inserts.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> Vec<(String, Value, String)> {
        self.upserts.lock().unwrap().clone()
    }
}

impl RecordStore for RecordingStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        _order: &Order,
    ) -> Result<Vec<Value>, MediaFeedError> {
        self.queries.lock().unwrap().push(collection.to_string());

        let gate = self.gates.lock().unwrap().get(collection).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Retrieval("simulated outage".to_string()));
        }

        let ignore_filters = self.ignore_filters.load(Ordering::SeqCst);
        Ok(self
            .rows(collection)
            .into_iter()
            .filter(|row| ignore_filters || filter.matches(row))
            .collect())
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<(), MediaFeedError> {
        self.inserts
            .lock()
            .unwrap()
            .push((collection.to_string(), record.clone()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Persist("simulated insert failure".to_string()));
        }
        self.seed(collection, vec![record]);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Value,
        conflict_key: &str,
    ) -> Result<(), MediaFeedError> {
        self.upserts.lock().unwrap().push((
            collection.to_string(),
            record.clone(),
            conflict_key.to_string(),
        ));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Persist("simulated upsert failure".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let rows = rows.entry(collection.to_string()).or_default();
        let key = record.get(conflict_key).cloned();
        match rows
            .iter_mut()
            .find(|row| key.is_some() && row.get(conflict_key) == key.as_ref())
        {
            Some(existing) => *existing = record,
            None => rows.push(record),
        }
        Ok(())
    }
}

/// In-memory object storage shaped like the hosted bucket
#[derive(Default)]
pub struct RecordingStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<(String, String, bool)>>,
    downloads: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fail_puts: AtomicBool,
    fail_downloads: AtomicBool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_object(&self, path: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    /// Holds downloads of `path` until the returned gate is notified
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(path.to_string(), gate.clone());
        gate
    }

    /// (path, content type, upsert) per put call
    pub fn puts(&self) -> Vec<(String, String, bool)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

impl ObjectStorage for RecordingStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), MediaFeedError> {
        self.puts
            .lock()
            .unwrap()
            .push((path.to_string(), content_type.to_string(), upsert));
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Storage("simulated put failure".to_string()));
        }
        self.store_object(path, bytes);
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        protected_url(path)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, MediaFeedError> {
        self.downloads.lock().unwrap().push(path.to_string());

        let gate = self.gates.lock().unwrap().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Storage("simulated download failure".to_string()));
        }
        self.object(path)
            .ok_or_else(|| MediaFeedError::Storage(format!("Object not found: {}", path)))
    }

    fn is_protected(&self, url: &str) -> bool {
        url.contains("supabase.co/storage")
    }

    fn object_path(&self, url: &str) -> Result<String, MediaFeedError> {
        let parts: Vec<&str> = url.split("/user-images/").collect();
        if parts.len() != 2 {
            return Err(MediaFeedError::Storage(
                "Invalid storage URL format".to_string(),
            ));
        }
        Ok(parts[1].to_string())
    }
}

/// Identity provider driven by the test
pub struct ScriptedIdentity {
    state: watch::Sender<IdentityState>,
    profiles: Mutex<Vec<Identity>>,
    fail_profiles: AtomicBool,
    profile_calls: AtomicUsize,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(IdentityState::Pending);
        Self {
            state,
            profiles: Mutex::new(Vec::new()),
            fail_profiles: AtomicBool::new(false),
            profile_calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, state: IdentityState) {
        self.state.send_replace(state);
    }

    pub fn fail_profiles(&self) {
        self.fail_profiles.store(true, Ordering::SeqCst);
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> Vec<Identity> {
        self.profiles.lock().unwrap().clone()
    }
}

impl IdentityProvider for ScriptedIdentity {
    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<(), MediaFeedError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(MediaFeedError::Profile("simulated profile failure".to_string()));
        }
        self.profiles.lock().unwrap().push(identity.clone());
        Ok(())
    }
}
