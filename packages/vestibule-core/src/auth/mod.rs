//! Session and authentication module.
//!
//! Provides the credential exchange protocol, the session registry, MFA
//! enrollment and the persistent session store.

pub mod manager;
pub mod mfa;
pub mod session;
pub mod store;
pub mod types;

pub use manager::{AuthManager, PasswordCredentials, SignupRequest};
pub use mfa::{ActivateMfaRequest, EnrollmentSecretRequest, MfaManager, UpdatePasswordRequest};
pub use session::{SessionRegistry, SessionSnapshot};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError, StoredSession};
pub use types::{
    AuthError, LinkedAccount, LinkedProfile, LoadingGauge, LoginKind, LoginOutcome, LoginType,
    MfaChallenge, Navigator, Notice, NoticeLevel, Notifier, Provider, Route, Session, SocialAuth,
    UserProfile,
};
