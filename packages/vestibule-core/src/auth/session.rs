//! In-memory session registry: the single source of truth for "am I logged
//! in, as whom, via what method".
//!
//! Reads are open to the whole application; writes are crate-private so only
//! the credential exchange and MFA protocols can mutate identity state.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::auth::types::{LoginType, UserProfile};

#[derive(Debug, Default)]
struct RegistryState {
    current_user: UserProfile,
    is_logged_in: bool,
    login_type: Option<LoginType>,
}

/// Read-mostly view of the active session. Cheap to clone; all clones share
/// the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

/// Point-in-time copy of the registry, for display and serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub current_user: UserProfile,
    pub is_logged_in: bool,
    pub login_type: Option<LoginType>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> UserProfile {
        self.inner.lock().unwrap().current_user.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.lock().unwrap().is_logged_in
    }

    pub fn login_type(&self) -> Option<LoginType> {
        self.inner.lock().unwrap().login_type
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().unwrap();
        SessionSnapshot {
            current_user: state.current_user.clone(),
            is_logged_in: state.is_logged_in,
            login_type: state.login_type,
        }
    }

    /// Install an authenticated identity. All three fields change under one
    /// lock so no reader observes a partially updated session.
    pub(crate) fn commit(&self, user: UserProfile, login_type: LoginType) {
        let mut state = self.inner.lock().unwrap();
        state.current_user = user;
        state.is_logged_in = true;
        state.login_type = Some(login_type);
    }

    /// Replace the cached profile without touching login state.
    pub(crate) fn set_current_user(&self, user: UserProfile) {
        self.inner.lock().unwrap().current_user = user;
    }

    /// Return to the unauthenticated state.
    pub(crate) fn reset(&self) {
        let mut state = self.inner.lock().unwrap();
        state.current_user = UserProfile::default();
        state.is_logged_in = false;
        state.login_type = None;
    }
}
