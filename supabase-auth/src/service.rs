use crate::models::{AuthSession, AuthUser, OAuthProvider, RedirectTokens, TokenResponse};
use media_feed::{upsert_profile, Identity, IdentityProvider, IdentityState, MediaFeedError, SupabaseClient};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;

/// Sessions are refreshed when they expire within this many seconds
const REFRESH_MARGIN_SECS: i64 = 60;

/// Error type for authentication operations
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    NetworkError(String),
    JsonError(String),
    ServerError(String),
    InvalidRedirect(String),
    IoError(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AuthError::JsonError(msg) => write!(f, "JSON error: {}", msg),
            AuthError::ServerError(msg) => write!(f, "Server error: {}", msg),
            AuthError::InvalidRedirect(msg) => write!(f, "Invalid redirect: {}", msg),
            AuthError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::JsonError(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::InvalidRedirect(err.to_string())
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Supabase session manager and identity provider
///
/// Clones share the session, the identity stream and the client token.
#[derive(Clone)]
pub struct SupabaseAuthService {
    client: SupabaseClient,
    session: Arc<RwLock<Option<AuthSession>>>,
    state: Arc<watch::Sender<IdentityState>>,
    session_file: Option<PathBuf>,
}

impl PartialEq for SupabaseAuthService {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for SupabaseAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAuthService")
            .field("client", &self.client)
            .field("session_file", &self.session_file)
            .finish()
    }
}

impl SupabaseAuthService {
    /// Create a service; the identity state stays `Pending` until
    /// [`restore_session`](Self::restore_session) resolves it
    pub fn new(client: SupabaseClient, session_file: Option<PathBuf>) -> Self {
        let (state, _) = watch::channel(IdentityState::Pending);
        Self {
            client,
            session: Arc::new(RwLock::new(None)),
            state: Arc::new(state),
            session_file,
        }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    pub fn current_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Provider authorize URL; query and fragment are stripped from `redirect_to`
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, AuthError> {
        let redirect = redirect_to
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let mut url = url::Url::parse(&self.client.endpoint("auth/v1/authorize"))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect);
        Ok(url.to_string())
    }

    /// Extracts the session tokens from the URL the provider redirected to
    pub fn parse_redirect_fragment(redirect_url: &str) -> Result<RedirectTokens, AuthError> {
        let url = url::Url::parse(redirect_url)?;
        let fragment = url
            .fragment()
            .ok_or_else(|| AuthError::InvalidRedirect("Redirect URL has no fragment".to_string()))?;

        let mut access_token = None;
        let mut refresh_token = None;
        let mut expires_in = None;
        let mut error = None;
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "access_token" => access_token = Some(value.into_owned()),
                "refresh_token" => refresh_token = Some(value.into_owned()),
                "expires_in" => expires_in = value.parse::<i64>().ok(),
                "error_description" => error = Some(value.into_owned()),
                "error" if error.is_none() => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(AuthError::ServerError(error));
        }
        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(RedirectTokens {
                access_token,
                refresh_token,
                expires_in,
            }),
            _ => Err(AuthError::InvalidRedirect(
                "Redirect URL carries no session".to_string(),
            )),
        }
    }

    /// Completes an OAuth sign-in from the redirect URL
    pub async fn complete_oauth_redirect(&self, redirect_url: &str) -> Result<Identity, AuthError> {
        let tokens = Self::parse_redirect_fragment(redirect_url)?;
        let user = self.fetch_user(&tokens.access_token).await?;
        let session = AuthSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_in.map(|secs| now_secs() + secs),
            user,
        };
        Ok(self.install(session))
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        log::info!("Signed in as {}", email);
        Ok(self.install(session))
    }

    /// Exchanges the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Identity, AuthError> {
        let refresh_token = self
            .current_session()
            .map(|session| session.refresh_token)
            .ok_or_else(|| AuthError::ServerError("No session to refresh".to_string()))?;
        let session = self.refresh_grant(&refresh_token).await?;
        Ok(self.install(session))
    }

    /// Refreshes the session ahead of its expiry for as long as the
    /// identity stream is open
    ///
    /// A failed refresh ends the session, so the feed sees `SignedOut`
    /// instead of requests failing on an expired token.
    pub async fn keep_session_fresh(&self) {
        let mut updates = self.state.subscribe();
        loop {
            updates.mark_unchanged();
            let delay = self
                .current_session()
                .and_then(|session| session.refresh_delay(now_secs(), REFRESH_MARGIN_SECS));

            let Some(delay) = delay else {
                if updates.changed().await.is_err() {
                    break;
                }
                continue;
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = self.refresh_session().await {
                        log::warn!("Session refresh failed, signing out: {}", e);
                        self.clear();
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Resolves the initial identity state from the persisted session
    ///
    /// Always leaves the state resolved: a missing, unreadable or
    /// unrefreshable session means `SignedOut`.
    pub async fn restore_session(&self) -> IdentityState {
        let session = match self.read_session_file() {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.clear();
                return IdentityState::SignedOut;
            }
            Err(e) => {
                log::warn!("Discarding stored session: {}", e);
                self.clear();
                return IdentityState::SignedOut;
            }
        };

        // An expiring token is never announced; only the refreshed one is
        let session = if session.expires_within(now_secs(), REFRESH_MARGIN_SECS) {
            match self.refresh_grant(&session.refresh_token).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    log::warn!("Stored session could not be refreshed: {}", e);
                    self.clear();
                    return IdentityState::SignedOut;
                }
            }
        } else {
            session
        };
        IdentityState::SignedIn(self.install(session))
    }

    /// Ends the session locally; the server-side logout is best effort
    pub async fn sign_out(&self) {
        if let Some(session) = self.current_session() {
            let result = self
                .client
                .http()
                .post(self.client.endpoint("auth/v1/logout"))
                .header("apikey", &self.client.config().anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    log::warn!("Logout returned status {}", response.status())
                }
                Err(e) => log::warn!("Logout request failed: {}", e),
                Ok(_) => {}
            }
        }
        self.clear();
        log::info!("Signed out");
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        log::debug!("Session refreshed");
        Ok(session)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AuthError> {
        let response = self
            .client
            .http()
            .post(self.client.endpoint("auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.client.config().anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AuthError::ServerError(format!(
                "Server returned status {}: {}",
                status, detail
            )));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::JsonError(format!("Failed to parse response: {}", e)))?;
        Ok(tokens.into_session(now_secs()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .http()
            .get(self.client.endpoint("auth/v1/user"))
            .header("apikey", &self.client.config().anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::ServerError(format!(
                "Server returned status: {}",
                response.status()
            )));
        }

        response
            .json::<AuthUser>()
            .await
            .map_err(|e| AuthError::JsonError(format!("Failed to parse user: {}", e)))
    }

    /// Makes `session` current and announces the identity
    fn install(&self, session: AuthSession) -> Identity {
        let identity = session.user.to_identity();
        self.client.set_access_token(Some(session.access_token.clone()));
        if let Err(e) = self.write_session_file(&session) {
            log::warn!("Failed to persist session: {}", e);
        }
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
        self.state.send_replace(IdentityState::SignedIn(identity.clone()));
        identity
    }

    fn clear(&self) {
        self.client.set_access_token(None);
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        if let Some(path) = &self.session_file {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
        self.state.send_replace(IdentityState::SignedOut);
    }

    fn read_session_file(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(path) = &self.session_file else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_session_file(&self, session: &AuthSession) -> Result<(), AuthError> {
        let Some(path) = &self.session_file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(session)?)?;
        Ok(())
    }
}

impl IdentityProvider for SupabaseAuthService {
    fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    async fn ensure_profile(&self, identity: &Identity) -> Result<(), MediaFeedError> {
        upsert_profile(&self.client, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserMetadata;
    use media_feed::SupabaseConfig;
    use std::time::Duration;
    use uuid::Uuid;

    fn service(session_file: Option<PathBuf>) -> SupabaseAuthService {
        service_at("https://demo.supabase.co", session_file)
    }

    fn service_at(url: &str, session_file: Option<PathBuf>) -> SupabaseAuthService {
        let client = SupabaseClient::new(SupabaseConfig::new(url, "anon-key")).unwrap();
        SupabaseAuthService::new(client, session_file)
    }

    fn temp_session_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("aura-auth-{}", Uuid::new_v4()))
            .join("session.json")
    }

    fn session(expires_at: Option<i64>) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some("demo@aura.app".to_string()),
                user_metadata: UserMetadata::default(),
            },
        }
    }

    #[test]
    fn test_authorize_url_strips_query_and_fragment() {
        let url = service(None)
            .authorize_url(OAuthProvider::Github, "http://localhost:8080/feed?x=1#top")
            .unwrap();
        assert!(url.starts_with("https://demo.supabase.co/auth/v1/authorize?"));
        assert!(url.contains("provider=github"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A8080%2Ffeed"));
        assert!(!url.contains("x%3D1"));
    }

    #[test]
    fn test_parse_redirect_fragment() {
        let tokens = SupabaseAuthService::parse_redirect_fragment(
            "http://localhost:8080/#access_token=abc&expires_in=3600&refresh_token=def&token_type=bearer",
        )
        .unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert_eq!(tokens.refresh_token, "def");
        assert_eq!(tokens.expires_in, Some(3600));
    }

    #[test]
    fn test_redirect_errors() {
        let denied = SupabaseAuthService::parse_redirect_fragment(
            "http://localhost:8080/#error=access_denied&error_description=User+cancelled",
        );
        assert_eq!(denied, Err(AuthError::ServerError("User cancelled".to_string())));

        let empty = SupabaseAuthService::parse_redirect_fragment("http://localhost:8080/");
        assert!(matches!(empty, Err(AuthError::InvalidRedirect(_))));

        let garbage = SupabaseAuthService::parse_redirect_fragment("not a url");
        assert!(matches!(garbage, Err(AuthError::InvalidRedirect(_))));
    }

    #[tokio::test]
    async fn test_restore_without_session_signs_out() {
        let auth = service(Some(temp_session_file()));
        let updates = auth.subscribe();
        assert_eq!(*updates.borrow(), IdentityState::Pending);

        assert_eq!(auth.restore_session().await, IdentityState::SignedOut);
        assert_eq!(*updates.borrow(), IdentityState::SignedOut);
        assert_eq!(auth.client().access_token(), None);
    }

    #[tokio::test]
    async fn test_restore_valid_session() {
        let path = temp_session_file();
        let stored = session(Some(now_secs() + 3600));
        service(Some(path.clone())).install(stored.clone());
        assert!(path.exists());

        let auth = service(Some(path.clone()));
        let state = auth.restore_session().await;
        assert_eq!(state, IdentityState::SignedIn(stored.user.to_identity()));
        assert_eq!(auth.client().access_token().as_deref(), Some("access"));
        assert_eq!(auth.current_session(), Some(stored));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_session_file_signs_out() {
        let path = temp_session_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let auth = service(Some(path.clone()));
        assert_eq!(auth.restore_session().await, IdentityState::SignedOut);
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_expired_session_is_never_announced_when_refresh_fails() {
        let path = temp_session_file();
        let mut stored = session(Some(now_secs() - 10));
        stored.access_token = "expired-token".to_string();
        service(Some(path.clone())).write_session_file(&stored).unwrap();

        // Nothing listens on the discard port, so the refresh grant fails
        let auth = service_at("http://127.0.0.1:9", Some(path.clone()));
        let mut updates = auth.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                let done = state == IdentityState::SignedOut;
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        assert_eq!(auth.restore_session().await, IdentityState::SignedOut);
        assert_eq!(auth.client().access_token(), None);
        assert_eq!(auth.current_session(), None);

        let seen = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.iter().all(|state| !matches!(state, IdentityState::SignedIn(_))));
        assert!(!path.exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_keep_session_fresh_signs_out_when_refresh_fails() {
        let auth = service_at("http://127.0.0.1:9", None);
        auth.install(session(Some(now_secs() + 30)));
        let mut updates = auth.subscribe();

        let refresher = auth.clone();
        let task = tokio::spawn(async move { refresher.keep_session_fresh().await });

        let state = tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|state| *state == IdentityState::SignedOut),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state, IdentityState::SignedOut);
        assert_eq!(auth.client().access_token(), None);
        task.abort();
    }

    #[tokio::test]
    async fn test_keep_session_fresh_waits_for_distant_expiry() {
        let auth = service_at("http://127.0.0.1:9", None);
        let stored = session(Some(now_secs() + 3600));
        auth.install(stored.clone());

        let refresher = auth.clone();
        let task = tokio::spawn(async move { refresher.keep_session_fresh().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(auth.current_session(), Some(stored));
        assert_eq!(auth.client().access_token().as_deref(), Some("access"));
        task.abort();
    }
}
