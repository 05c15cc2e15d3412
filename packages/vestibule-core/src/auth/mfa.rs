//! Second-factor enrollment and account security settings.
//!
//! Layered on top of the credential exchange protocol: everything here runs
//! against an already-authenticated session. Enrollment state (QR payload,
//! recovery codes, linked third-party accounts) lives here and nowhere else.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Value, json};

use crate::api::client::{ApiClient, ApiEnvelope, ApiError};
use crate::auth::manager::encode;
use crate::auth::session::SessionRegistry;
use crate::auth::store::SessionStore;
use crate::auth::types::{
    AuthError, LinkedAccount, LoadingGauge, LoginKind, Notice, Notifier,
};

/// Request for a fresh enrollment secret. Password accounts must present
/// their password again; social accounts have none to present.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentSecretRequest {
    pub login_type: LoginKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Request to switch MFA on after a verified enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateMfaRequest {
    pub enabled: bool,
    pub otp: String,
}

/// Request to replace the account password from the settings screen.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordRequest {
    pub existing_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Clone)]
struct MfaSetupState {
    qr: Option<String>,
    recovery_codes: Vec<String>,
    linked_accounts: Vec<LinkedAccount>,
}

/// Manager of MFA enrollment and account security settings.
pub struct MfaManager<A> {
    api: A,
    registry: SessionRegistry,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    loading: LoadingGauge,
    state: Mutex<MfaSetupState>,
}

impl<A: ApiClient> MfaManager<A> {
    pub fn new(
        api: A,
        registry: SessionRegistry,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            registry,
            store,
            notifier,
            loading: LoadingGauge::default(),
            state: Mutex::new(MfaSetupState::default()),
        }
    }

    /// Share a busy gauge with other managers on the same screen.
    pub fn with_loading_gauge(mut self, gauge: LoadingGauge) -> Self {
        self.loading = gauge;
        self
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// Last issued QR payload, if any.
    pub fn qr(&self) -> Option<String> {
        self.state.lock().unwrap().qr.clone()
    }

    /// Recovery codes from the latest issuance.
    pub fn recovery_codes(&self) -> Vec<String> {
        self.state.lock().unwrap().recovery_codes.clone()
    }

    /// Linked third-party accounts from the latest fetch.
    pub fn linked_accounts(&self) -> Vec<LinkedAccount> {
        self.state.lock().unwrap().linked_accounts.clone()
    }

    /// Fetch a fresh authenticator secret as a QR image payload. Always
    /// refetches; the server rotates the pending secret on each call.
    pub async fn request_enrollment_secret(
        &self,
        request: &EnrollmentSecretRequest,
    ) -> Result<String, AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.post_accepted("/qrcode", Some(encode(request)?)).await?;
        let image = envelope
            .image
            .clone()
            .ok_or(AuthError::Transport(ApiError::Malformed("image")))?;
        self.state.lock().unwrap().qr = Some(image.clone());
        Ok(image)
    }

    /// Confirm a code against the freshly issued secret. On success the
    /// server issues recovery codes, which are stored and returned. Does
    /// not log the user in and does not flip the profile flag.
    pub async fn verify_enrollment_code(&self, code: &str) -> Result<Vec<String>, AuthError> {
        let _busy = self.loading.begin();
        let envelope = self
            .post_accepted("/verify_otp", Some(json!({ "otp": code })))
            .await?;
        let codes: Vec<String> = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("codes"))
            .and_then(|codes| serde_json::from_value(codes.clone()).ok())
            .ok_or(AuthError::Transport(ApiError::Malformed("data.codes")))?;
        self.state.lock().unwrap().recovery_codes = codes.clone();
        self.notify_success(&envelope);
        Ok(codes)
    }

    /// Switch MFA on for the account, then flip the cached profile's
    /// `mfa_enabled` flag in place. The rest of the cached record is left
    /// untouched; no fresh profile fetch happens here.
    pub async fn activate(&self, request: &ActivateMfaRequest) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.post_accepted("/setup_mfa", Some(encode(request)?)).await?;
        self.notify_success(&envelope);

        match self.store.load()? {
            Some(mut record) => {
                record.user.mfa_enabled = true;
                self.store.save(&record)?;
                self.registry.set_current_user(record.user);
            }
            None => {
                tracing::warn!("No persisted session to update after MFA activation");
            }
        }
        Ok(())
    }

    /// Invalidate and replace the account's recovery codes.
    pub async fn regenerate_recovery_codes(&self) -> Result<Vec<String>, AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.post_accepted("/recovery_codes", None).await?;
        let codes: Vec<String> = envelope
            .data
            .clone()
            .and_then(|data| serde_json::from_value(data).ok())
            .ok_or(AuthError::Transport(ApiError::Malformed("data")))?;
        self.state.lock().unwrap().recovery_codes = codes.clone();
        Ok(codes)
    }

    /// Fetch the authoritative list of linked third-party accounts.
    pub async fn refresh_linked_accounts(&self) -> Result<Vec<LinkedAccount>, AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.get_accepted("/social").await?;
        let accounts = envelope.login_methods.clone().unwrap_or_default();
        self.state.lock().unwrap().linked_accounts = accounts.clone();
        Ok(accounts)
    }

    /// Unlink a third-party account, then re-fetch the list from the server
    /// rather than removing the entry locally.
    pub async fn unlink_account(&self, entity_id: &str) -> Result<Vec<LinkedAccount>, AuthError> {
        {
            let _busy = self.loading.begin();
            let envelope = self.delete_accepted(&format!("/social/{entity_id}")).await?;
            self.notify_success(&envelope);
        }
        self.refresh_linked_accounts().await
    }

    /// Replace the account password.
    pub async fn update_password(&self, request: &UpdatePasswordRequest) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let envelope = self
            .post_accepted("/update_password", Some(encode(request)?))
            .await?;
        self.notify_success(&envelope);
        Ok(())
    }

    async fn post_accepted(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiEnvelope, AuthError> {
        let envelope = match self.api.post(path, body).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Request to {path} failed in transit: {e}");
                return Err(AuthError::Transport(e));
            }
        };
        self.accepted(envelope)
    }

    async fn get_accepted(&self, path: &str) -> Result<ApiEnvelope, AuthError> {
        let envelope = match self.api.get(path).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Request to {path} failed in transit: {e}");
                return Err(AuthError::Transport(e));
            }
        };
        self.accepted(envelope)
    }

    async fn delete_accepted(&self, path: &str) -> Result<ApiEnvelope, AuthError> {
        let envelope = match self.api.delete(path).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Request to {path} failed in transit: {e}");
                return Err(AuthError::Transport(e));
            }
        };
        self.accepted(envelope)
    }

    fn accepted(&self, envelope: ApiEnvelope) -> Result<ApiEnvelope, AuthError> {
        if !envelope.success {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| "The request was rejected".to_string());
            self.notifier.notify(Notice::error("Error", &message));
            return Err(AuthError::ServerRejected(message));
        }
        Ok(envelope)
    }

    fn notify_success(&self, envelope: &ApiEnvelope) {
        let message = envelope.message.clone().unwrap_or_default();
        self.notifier.notify(Notice::success("Success", &message));
    }
}
