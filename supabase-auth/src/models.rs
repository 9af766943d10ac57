use media_feed::Identity;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Provider-supplied profile data of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Google puts the avatar here
    #[serde(default)]
    pub picture: Option<String>,
}

/// User object returned by the auth API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    pub fn to_identity(&self) -> Identity {
        let metadata = &self.user_metadata;
        Identity {
            id: self.id,
            email: self.email.clone(),
            display_name: metadata.name.clone().or_else(|| metadata.full_name.clone()),
            avatar_url: metadata
                .avatar_url
                .clone()
                .or_else(|| metadata.picture.clone()),
        }
    }
}

/// A signed-in session as persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token expires within `margin_secs` of `now`
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + margin_secs,
            None => false,
        }
    }

    /// Time until the token should be refreshed, `margin_secs` ahead of expiry
    ///
    /// Zero exactly when [`expires_within`](Self::expires_within) holds;
    /// `None` for sessions without an expiry.
    pub fn refresh_delay(&self, now: i64, margin_secs: i64) -> Option<Duration> {
        let expires_at = self.expires_at?;
        let secs = (expires_at - margin_secs - now).max(0);
        Some(Duration::from_secs(secs as u64))
    }
}

/// Response of the `/auth/v1/token` grants
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    pub fn into_session(self, now: i64) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Tokens carried in the fragment of an OAuth redirect
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
}

/// Supported OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Github => "GitHub",
        }
    }
}

/// State of the sign-in menu
#[derive(Debug, Clone, PartialEq)]
pub enum LoginState {
    Idle,
    /// A sign-in request is in flight
    SigningIn,
    /// The browser was sent to the provider; waiting for the redirect URL
    AwaitingRedirect { provider: OAuthProvider, authorize_url: String },
    Error(String),
}
