//! Collaborator wiring for the configured backend

use crate::config::{AppConfig, BackendKind};
use crate::error::AppError;
use media_feed::{
    BlobRegistry, FeedController, FeedLoad, Filter, Identity, IdentityProvider, IdentityState,
    LocalIdentityProvider, LocalObjectStorage, LocalRecordStore, MediaFeedError, MediaRepository,
    MediaResolver, ObjectStorage, Order, RecordStore, SupabaseClient, UploadCoordinator,
};
use serde_json::Value;
use std::sync::Arc;
use supabase_auth::SupabaseAuthService;
use tokio::sync::watch;

const LOCAL_BUCKET: &str = "user-images";

/// Record store of the active backend
pub enum Records {
    Supabase(SupabaseClient),
    Local(LocalRecordStore),
}

impl RecordStore for Records {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: &Order,
    ) -> Result<Vec<Value>, MediaFeedError> {
        match self {
            Records::Supabase(client) => client.query(collection, filter, order).await,
            Records::Local(store) => store.query(collection, filter, order).await,
        }
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<(), MediaFeedError> {
        match self {
            Records::Supabase(client) => client.insert(collection, record).await,
            Records::Local(store) => store.insert(collection, record).await,
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Value,
        conflict_key: &str,
    ) -> Result<(), MediaFeedError> {
        match self {
            Records::Supabase(client) => client.upsert(collection, record, conflict_key).await,
            Records::Local(store) => store.upsert(collection, record, conflict_key).await,
        }
    }
}

/// Object storage of the active backend
pub enum Objects {
    Supabase(SupabaseClient),
    Local(LocalObjectStorage),
}

impl ObjectStorage for Objects {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), MediaFeedError> {
        match self {
            Objects::Supabase(client) => client.put(path, bytes, content_type, upsert).await,
            Objects::Local(storage) => storage.put(path, bytes, content_type, upsert).await,
        }
    }

    fn public_url(&self, path: &str) -> String {
        match self {
            Objects::Supabase(client) => client.public_url(path),
            Objects::Local(storage) => storage.public_url(path),
        }
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, MediaFeedError> {
        match self {
            Objects::Supabase(client) => client.download(path).await,
            Objects::Local(storage) => storage.download(path).await,
        }
    }

    fn is_protected(&self, url: &str) -> bool {
        match self {
            Objects::Supabase(client) => client.is_protected(url),
            Objects::Local(storage) => storage.is_protected(url),
        }
    }

    fn object_path(&self, url: &str) -> Result<String, MediaFeedError> {
        match self {
            Objects::Supabase(client) => client.object_path(url),
            Objects::Local(storage) => storage.object_path(url),
        }
    }
}

/// Identity provider of the active backend
pub enum Auth {
    Supabase(SupabaseAuthService),
    Local(LocalIdentityProvider<Records>),
}

impl Auth {
    /// The hosted auth service, if any; drives the sign-in menu
    pub fn supabase(&self) -> Option<&SupabaseAuthService> {
        match self {
            Auth::Supabase(service) => Some(service),
            Auth::Local(_) => None,
        }
    }

    /// The offline provider, if any; drives the local account menu
    pub fn local(&self) -> Option<&LocalIdentityProvider<Records>> {
        match self {
            Auth::Local(provider) => Some(provider),
            Auth::Supabase(_) => None,
        }
    }

    /// Resolves the initial identity state, then keeps the session alive
    pub async fn start(&self) {
        match self {
            Auth::Supabase(service) => {
                let state = service.restore_session().await;
                log::info!("Signed in at startup: {}", state.identity().is_some());
                service.keep_session_fresh().await;
            }
            Auth::Local(provider) => {
                log::info!("Local identity: {:?}", provider.current().identity().map(|i| i.id));
            }
        }
    }
}

impl IdentityProvider for Auth {
    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        match self {
            Auth::Supabase(service) => service.subscribe(),
            Auth::Local(provider) => provider.subscribe(),
        }
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<(), MediaFeedError> {
        match self {
            Auth::Supabase(service) => service.ensure_profile(identity).await,
            Auth::Local(provider) => provider.ensure_profile(identity).await,
        }
    }
}

/// Everything the UI needs, provided as Dioxus context
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<AppConfig>,
    pub feed: FeedController<Records>,
    pub resolver: MediaResolver<Objects>,
    pub uploads: UploadCoordinator<Records, Objects>,
    pub auth: Arc<Auth>,
}

impl PartialEq for AppServices {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.auth, &other.auth)
    }
}

impl AppServices {
    pub fn build(config: AppConfig) -> Result<Self, AppError> {
        let (records, objects, auth) = match config.backend {
            BackendKind::Supabase => {
                let client = SupabaseClient::new(config.supabase_config()?)?;
                let records = Arc::new(Records::Supabase(client.clone()));
                let objects = Arc::new(Objects::Supabase(client.clone()));
                let auth = Auth::Supabase(SupabaseAuthService::new(
                    client,
                    Some(config.session_file()),
                ));
                (records, objects, auth)
            }
            BackendKind::Local => {
                let data_dir = config.data_dir();
                let store = LocalRecordStore::open(data_dir.join("aura.db"))?;
                let records = Arc::new(Records::Local(store));
                let objects = Arc::new(Objects::Local(LocalObjectStorage::new(
                    data_dir.join("objects"),
                    LOCAL_BUCKET,
                )));
                let auth = Auth::Local(LocalIdentityProvider::new(
                    records.clone(),
                    config.local_user().into(),
                ));
                (records, objects, auth)
            }
        };
        log::info!("Using {:?} backend", config.backend);

        Ok(Self {
            config: Arc::new(config),
            feed: FeedController::new(MediaRepository::new(records.clone())),
            resolver: MediaResolver::new(objects.clone(), BlobRegistry::new()),
            uploads: UploadCoordinator::new(records, objects),
            auth: Arc::new(auth),
        })
    }

    /// Restores the session and keeps the feed following identity changes
    ///
    /// Runs until the identity stream closes; `spawn_load` runs each feed load.
    pub async fn run_identity<F>(&self, spawn_load: F)
    where
        F: FnMut(FeedLoad<Records>),
    {
        let auth = self.auth.clone();
        let feed = self.feed.clone();
        let follow = feed.follow_identity(auth.as_ref(), spawn_load);
        let start = auth.start();
        tokio::join!(follow, start);
    }
}
