//! Vestibule Core Library
//!
//! This crate provides the client-side session machinery for Vestibule
//! applications:
//! - Credential exchange (password, social providers, one-time and recovery
//!   codes) against the remote identity API
//! - A session registry holding the single authoritative "who am I" view
//! - MFA enrollment and account security settings
//! - Durable session storage (keyring with file fallback)
//!
//! # Features
//!
//! - `file-storage` (default): Use file-based session storage
//! - `keyring-storage`: Front the file with the platform keyring
//!   (requires libsecret on Linux)
//! - `testing`: Expose scripted fakes for embedder integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vestibule_core::api::HttpApiClient;
//! use vestibule_core::auth::{
//!     AuthManager, FileSessionStore, LoginOutcome, Notice, Notifier, Navigator,
//!     PasswordCredentials, Route, SessionRegistry, SessionStore,
//! };
//!
//! struct Console;
//! impl Notifier for Console {
//!     fn notify(&self, notice: Notice) {
//!         println!("{}: {}", notice.title, notice.message);
//!     }
//! }
//! impl Navigator for Console {
//!     fn navigate(&self, route: Route) {
//!         println!("-> {route:?}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new()?);
//!     let api = HttpApiClient::from_config(Arc::clone(&store))?;
//!     let ports = Arc::new(Console);
//!     let manager = AuthManager::new(
//!         api,
//!         SessionRegistry::new(),
//!         store,
//!         ports.clone(),
//!         ports,
//!     );
//!
//!     let outcome = manager
//!         .login(&PasswordCredentials {
//!             email: "a@x.com".into(),
//!             password: "secret".into(),
//!         })
//!         .await?;
//!
//!     if let LoginOutcome::MfaRequired(challenge) = outcome {
//!         println!("second factor needed for {:?}", challenge.email);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use api::{ApiClient, ApiEnvelope, ApiError, HttpApiClient};
pub use auth::{
    AuthError, AuthManager, FileSessionStore, LoginOutcome, LoginType, MfaChallenge, MfaManager,
    Provider, Session, SessionRegistry, SessionStore, UserProfile,
};
