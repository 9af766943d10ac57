//! Feed state machine
//!
//! The controller reacts to two inputs, the feed mode and the identity
//! state, and turns every change into a sequence-tagged [`FeedLoad`]. Loads
//! are plain futures so the caller decides where they run (a UI task, a
//! tokio task). Only the load carrying the latest sequence number may
//! change the feed; results of superseded loads are dropped regardless of
//! completion order.

use crate::backend::{IdentityProvider, RecordStore};
use crate::models::{FeedMode, Identity, IdentityState, MediaItem};
use crate::repository::MediaRepository;
use crate::shuffle::shuffle;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Presentation state of the feed
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeedState {
    #[default]
    Idle,
    /// Waiting for the identity provider to resolve the initial session
    AuthPending,
    Loading,
    Ready(Vec<MediaItem>),
    /// `MyPhotos` without a signed-in user: show a sign-in prompt
    EmptyUnauthenticated,
}

impl FeedState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FeedState::AuthPending | FeedState::Loading)
    }

    pub fn items(&self) -> &[MediaItem] {
        match self {
            FeedState::Ready(items) => items,
            _ => &[],
        }
    }
}

/// Everything the UI needs to render the feed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedSnapshot {
    pub mode: FeedMode,
    pub identity: IdentityState,
    pub state: FeedState,
    /// Sequence number of the latest load request
    pub sequence: u64,
}

/// Keeps only products carrying a `model1` rendition
pub fn filter_eligible(items: Vec<MediaItem>) -> Vec<MediaItem> {
    items
        .into_iter()
        .filter(|item| item.is_feed_eligible())
        .collect()
}

/// Orchestrates mode selection, identity changes and feed loads
pub struct FeedController<S> {
    repository: MediaRepository<S>,
    snapshot: Arc<Mutex<FeedSnapshot>>,
    updates: Arc<watch::Sender<FeedSnapshot>>,
}

impl<S> Clone for FeedController<S> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            snapshot: self.snapshot.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl<S: RecordStore> FeedController<S> {
    pub fn new(repository: MediaRepository<S>) -> Self {
        Self::with_mode(repository, FeedMode::default())
    }

    pub fn with_mode(repository: MediaRepository<S>, mode: FeedMode) -> Self {
        let snapshot = FeedSnapshot {
            mode,
            ..FeedSnapshot::default()
        };
        let (updates, _) = watch::channel(snapshot.clone());
        Self {
            repository,
            snapshot: Arc::new(Mutex::new(snapshot)),
            updates: Arc::new(updates),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stream of snapshots, starting with the current one
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().clone()
    }

    /// Switches the feed mode; selecting the active mode again is a no-op
    pub fn set_mode(&self, mode: FeedMode) -> Option<FeedLoad<S>> {
        self.transition(|snapshot| {
            if snapshot.mode == mode && snapshot.state != FeedState::Idle {
                return false;
            }
            snapshot.mode = mode;
            true
        }, true)
    }

    /// Applies an identity transition pushed by the identity provider
    pub fn set_identity(&self, identity: IdentityState) -> Option<FeedLoad<S>> {
        self.transition(|snapshot| {
            if snapshot.identity == identity
                && identity.is_resolved()
                && snapshot.state != FeedState::Idle
            {
                return false;
            }
            snapshot.identity = identity;
            true
        }, true)
    }

    /// Reloads and reshuffles the current mode
    pub fn reload(&self) -> Option<FeedLoad<S>> {
        self.transition(|_| true, true)
    }

    /// Re-reads the user's media after an upload, newest first and unshuffled
    ///
    /// Only meaningful in `MyPhotos`; other modes are left alone.
    pub fn refresh_after_upload(&self) -> Option<FeedLoad<S>> {
        self.transition(|snapshot| snapshot.mode == FeedMode::MyPhotos, false)
    }

    /// Follows the provider's identity stream until it closes
    ///
    /// Profiles are upserted for newly signed-in identities before the feed
    /// reacts; a failed upsert is logged and never blocks sign-in. Every
    /// resulting load is handed to `on_load` for the caller to run.
    pub async fn follow_identity<P, F>(&self, provider: &P, mut on_load: F)
    where
        P: IdentityProvider,
        F: FnMut(FeedLoad<S>),
    {
        let mut updates = provider.subscribe();
        loop {
            let state = updates.borrow_and_update().clone();

            let changed = self.lock().identity != state;
            if let IdentityState::SignedIn(identity) = &state {
                if changed {
                    if let Err(e) = provider.ensure_profile(identity).await {
                        log::error!("Failed to create user profile: {}", e);
                    }
                }
            }

            if let Some(load) = self.set_identity(state) {
                on_load(load);
            }

            if updates.changed().await.is_err() {
                log::debug!("Identity stream closed");
                break;
            }
        }
    }

    fn transition<F>(&self, change: F, shuffle: bool) -> Option<FeedLoad<S>>
    where
        F: FnOnce(&mut FeedSnapshot) -> bool,
    {
        let mut snapshot = self.lock();
        if !change(&mut snapshot) {
            return None;
        }

        snapshot.sequence += 1;
        let load = if !snapshot.identity.is_resolved() {
            snapshot.state = FeedState::AuthPending;
            None
        } else {
            let identity = snapshot.identity.identity().cloned();
            if snapshot.mode.requires_identity() && identity.is_none() {
                snapshot.state = FeedState::EmptyUnauthenticated;
                None
            } else {
                snapshot.state = FeedState::Loading;
                Some(FeedLoad {
                    sequence: snapshot.sequence,
                    mode: snapshot.mode,
                    identity,
                    shuffle,
                    controller: self.clone(),
                })
            }
        };

        let published = snapshot.clone();
        drop(snapshot);
        self.updates.send_replace(published);
        load
    }

    fn apply(&self, sequence: u64, state: FeedState) -> bool {
        let mut snapshot = self.lock();
        if snapshot.sequence != sequence {
            log::debug!(
                "Discarding stale feed load #{} (latest #{})",
                sequence,
                snapshot.sequence
            );
            return false;
        }
        snapshot.state = state;
        let published = snapshot.clone();
        drop(snapshot);
        self.updates.send_replace(published);
        true
    }
}

/// One pending feed load, tagged with its request sequence number
pub struct FeedLoad<S> {
    sequence: u64,
    mode: FeedMode,
    identity: Option<Identity>,
    shuffle: bool,
    controller: FeedController<S>,
}

impl<S> std::fmt::Debug for FeedLoad<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedLoad")
            .field("sequence", &self.sequence)
            .field("mode", &self.mode)
            .field("shuffle", &self.shuffle)
            .finish()
    }
}

impl<S: RecordStore> FeedLoad<S> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Fetches, filters and shuffles; returns whether the result was applied
    ///
    /// Read failures are logged and produce an empty feed.
    pub async fn run(self) -> bool {
        let repository = &self.controller.repository;
        let result = match (self.mode, &self.identity) {
            (FeedMode::AfProducts, _) => repository.fetch_products().await.map(filter_eligible),
            (FeedMode::MyPhotos, Some(identity)) => {
                repository.fetch_user_media(&identity.id).await
            }
            (FeedMode::MyPhotos, None) => Ok(Vec::new()),
        };

        let items = match result {
            Ok(items) if self.shuffle => shuffle(&items),
            Ok(items) => items,
            Err(e) => {
                log::error!("Error loading media: {}", e);
                Vec::new()
            }
        };

        self.controller.apply(self.sequence, FeedState::Ready(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::collections;
    use crate::models::{MediaType, Renditions};
    use crate::testing::{identity, product_row, user_media_row, RecordingStore, ScriptedIdentity};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn controller(store: &Arc<RecordingStore>) -> FeedController<RecordingStore> {
        FeedController::new(MediaRepository::new(store.clone()))
    }

    fn ids(state: &FeedState) -> BTreeSet<i64> {
        state.items().iter().map(|item| item.id).collect()
    }

    fn seeded_store() -> Arc<RecordingStore> {
        let owner = identity().id;
        let store = Arc::new(RecordingStore::new());
        store.seed(
            collections::PRODUCTS,
            vec![
                product_row(1, true),
                product_row(2, false),
                product_row(3, true),
                product_row(4, true),
            ],
        );
        store.seed(
            collections::USER_MEDIA,
            vec![
                user_media_row(10, &owner, "2025-01-01T00:00:00Z"),
                user_media_row(11, &owner, "2025-01-03T00:00:00Z"),
                user_media_row(12, &owner, "2025-01-02T00:00:00Z"),
            ],
        );
        store
    }

    #[test]
    fn test_eligibility_filter() {
        let mut with_model = MediaItem::new(1, MediaType::Image, "one");
        with_model.images = Some(Renditions::new().with("model1", "a"));
        let mut without_model = MediaItem::new(2, MediaType::Image, "two");
        without_model.images = Some(Renditions::new());
        let no_images = MediaItem::new(3, MediaType::Image, "three");

        let kept = filter_eligible(vec![with_model, without_model, no_images]);
        let kept: Vec<i64> = kept.iter().map(|item| item.id).collect();
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn test_pending_identity_waits_for_auth() {
        let store = seeded_store();
        let controller = controller(&store);
        assert_eq!(controller.snapshot().state, FeedState::Idle);

        assert!(controller.set_identity(IdentityState::Pending).is_none());
        assert_eq!(controller.snapshot().state, FeedState::AuthPending);
        assert!(controller.snapshot().state.is_loading());
        assert_eq!(store.query_count(collections::PRODUCTS), 0);
    }

    #[tokio::test]
    async fn test_products_are_filtered_and_shuffled() {
        let store = seeded_store();
        let controller = controller(&store);

        let load = controller.set_identity(IdentityState::SignedOut).unwrap();
        assert_eq!(controller.snapshot().state, FeedState::Loading);
        assert!(load.run().await);

        let snapshot = controller.snapshot();
        assert_eq!(ids(&snapshot.state), BTreeSet::from([1, 3, 4]));
        assert!(!snapshot.state.is_loading());
    }

    #[tokio::test]
    async fn test_my_photos_without_identity_skips_repository() {
        let store = seeded_store();
        let controller = controller(&store);
        controller.set_identity(IdentityState::SignedOut);

        assert!(controller.set_mode(FeedMode::MyPhotos).is_none());
        assert_eq!(
            controller.snapshot().state,
            FeedState::EmptyUnauthenticated
        );
        assert_eq!(store.query_count(collections::USER_MEDIA), 0);
    }

    #[tokio::test]
    async fn test_last_request_wins_across_mode_switch() {
        let store = seeded_store();
        let gate = store.gate(collections::PRODUCTS);
        let controller = controller(&store);

        let products = controller
            .set_identity(IdentityState::SignedIn(identity()))
            .unwrap();
        let products = tokio::spawn(products.run());
        tokio::task::yield_now().await;
        assert_eq!(store.query_count(collections::PRODUCTS), 1);

        let photos = controller.set_mode(FeedMode::MyPhotos).unwrap();
        assert!(photos.run().await);

        // The products fetch resolves last and must not win
        gate.notify_one();
        assert!(!products.await.unwrap());

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mode, FeedMode::MyPhotos);
        assert_eq!(ids(&snapshot.state), BTreeSet::from([10, 11, 12]));
    }

    #[tokio::test]
    async fn test_sign_out_during_load_keeps_empty_state() {
        let store = seeded_store();
        let gate = store.gate(collections::USER_MEDIA);
        let controller = FeedController::with_mode(
            MediaRepository::new(store.clone()),
            FeedMode::MyPhotos,
        );

        let load = controller
            .set_identity(IdentityState::SignedIn(identity()))
            .unwrap();
        let load = tokio::spawn(load.run());
        tokio::task::yield_now().await;

        assert!(controller.set_identity(IdentityState::SignedOut).is_none());
        gate.notify_one();
        assert!(!load.await.unwrap());
        assert_eq!(
            controller.snapshot().state,
            FeedState::EmptyUnauthenticated
        );
    }

    #[tokio::test]
    async fn test_repository_failure_fails_open_to_empty_feed() {
        let store = seeded_store();
        store.fail_queries();
        let controller = controller(&store);

        let load = controller.set_identity(IdentityState::SignedOut).unwrap();
        assert!(load.run().await);
        assert_eq!(controller.snapshot().state, FeedState::Ready(Vec::new()));
    }

    #[tokio::test]
    async fn test_reselecting_active_mode_is_noop() {
        let store = seeded_store();
        let controller = controller(&store);
        controller
            .set_identity(IdentityState::SignedOut)
            .unwrap()
            .run()
            .await;

        assert!(controller.set_mode(FeedMode::AfProducts).is_none());
        assert_eq!(store.query_count(collections::PRODUCTS), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_upload_is_newest_first() {
        let store = seeded_store();
        let controller = FeedController::with_mode(
            MediaRepository::new(store.clone()),
            FeedMode::MyPhotos,
        );
        controller
            .set_identity(IdentityState::SignedIn(identity()))
            .unwrap()
            .run()
            .await;

        let refresh = controller.refresh_after_upload().unwrap();
        assert!(refresh.run().await);
        let order: Vec<i64> = controller
            .snapshot()
            .state
            .items()
            .iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(order, vec![11, 12, 10]);
        assert_eq!(store.query_count(collections::USER_MEDIA), 2);
    }

    #[test]
    fn test_refresh_after_upload_ignores_product_mode() {
        let store = seeded_store();
        let controller = controller(&store);
        controller.set_identity(IdentityState::SignedIn(identity()));
        assert!(controller.refresh_after_upload().is_none());
    }

    #[tokio::test]
    async fn test_follow_identity_upserts_profile_and_loads() {
        let store = seeded_store();
        let controller = FeedController::with_mode(
            MediaRepository::new(store.clone()),
            FeedMode::MyPhotos,
        );
        let provider = Arc::new(ScriptedIdentity::new());
        provider.fail_profiles();

        let follower = {
            let controller = controller.clone();
            let provider = provider.clone();
            tokio::spawn(async move {
                controller
                    .follow_identity(provider.as_ref(), |load| {
                        tokio::spawn(load.run());
                    })
                    .await
            })
        };

        let mut updates = controller.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|s| s.state == FeedState::AuthPending),
        )
        .await
        .unwrap()
        .unwrap();

        provider.push(IdentityState::SignedIn(identity()));
        tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|s| matches!(s.state, FeedState::Ready(_))),
        )
        .await
        .unwrap()
        .unwrap();

        // A failed profile upsert does not block the feed
        assert_eq!(provider.profile_calls(), 1);
        assert_eq!(ids(&controller.snapshot().state), BTreeSet::from([10, 11, 12]));

        provider.push(IdentityState::SignedOut);
        tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|s| s.state == FeedState::EmptyUnauthenticated),
        )
        .await
        .unwrap()
        .unwrap();

        follower.abort();
    }
}
