//! # Supabase Auth
//!
//! Session management against the Supabase auth API, exposed to the media
//! feed as an [`IdentityProvider`](media_feed::IdentityProvider).
//!
//! This crate provides:
//! - OAuth sign-in (Google, GitHub) through the browser redirect flow
//! - Email/password sign-in and refresh-token renewal
//! - Session persistence and restoration at startup
//! - A stream of identity transitions for the feed
//! - Dioxus UI components for the sign-in menu
//!
//! ## Separation of Concerns
//!
//! The access token is installed on the shared
//! [`SupabaseClient`](media_feed::SupabaseClient), so record and storage
//! calls made through the same client run as the signed-in user. The crate
//! does not decide what the feed shows; it only reports who is signed in.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use supabase_auth::{SupabaseAuthService, OAuthProvider};
//!
//! let auth = SupabaseAuthService::new(client, Some(session_file));
//! auth.restore_session().await;
//! let url = auth.authorize_url(OAuthProvider::Google, "http://localhost:8080/")?;
//! ```

pub mod component;
pub mod models;
pub mod service;

pub use component::{AuthButton, AuthButtonProps, AuthLabels};
pub use models::{AuthSession, AuthUser, LoginState, OAuthProvider, RedirectTokens, UserMetadata};
pub use service::{AuthError, SupabaseAuthService};
