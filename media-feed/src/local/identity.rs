use crate::backend::{IdentityProvider, RecordStore};
use crate::error::MediaFeedError;
use crate::models::{Identity, IdentityState};
use crate::profile::upsert_profile;
use std::sync::Arc;
use tokio::sync::watch;

/// Identity provider for offline use: the host app signs the configured
/// user in and out
pub struct LocalIdentityProvider<S> {
    state: watch::Sender<IdentityState>,
    store: Arc<S>,
}

impl<S: RecordStore> LocalIdentityProvider<S> {
    pub fn new(store: Arc<S>, initial: IdentityState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state, store }
    }

    pub fn current(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn sign_in(&self, identity: Identity) {
        log::info!("Local sign-in as {}", identity.id);
        self.state.send_replace(IdentityState::SignedIn(identity));
    }

    pub fn sign_out(&self) {
        log::info!("Local sign-out");
        self.state.send_replace(IdentityState::SignedOut);
    }
}

impl<S: RecordStore> IdentityProvider for LocalIdentityProvider<S> {
    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<(), MediaFeedError> {
        upsert_profile(self.store.as_ref(), identity).await
    }
}
