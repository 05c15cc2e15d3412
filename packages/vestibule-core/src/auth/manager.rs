//! Credential exchange protocol.
//!
//! One entry point per credential kind (password, social provider token,
//! one-time code, recovery code), all converging on a single decision
//! policy: an unverified account blocks the session, an MFA-enabled account
//! yields a challenge, anything else commits the session to the registry
//! and the persistent store as one unit.
//!
//! Concurrent submissions of the same credential are not fenced here;
//! embedders should disable their submit path while [`AuthManager::is_loading`]
//! reports an operation in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use crate::api::client::{ApiClient, ApiEnvelope, ApiError};
use crate::auth::session::SessionRegistry;
use crate::auth::store::{SessionStore, StoredSession};
use crate::auth::types::{
    AuthError, LoadingGauge, LoginOutcome, LoginType, MfaChallenge, Navigator, Notice, Notifier,
    Provider, Route, Session, SocialAuth, UserProfile, full_name_from_display,
    full_name_from_parts, social_union,
};

/// Time the email-confirmation banner stays on screen before the committed
/// session navigates away.
const CONFIRMATION_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Password credential pair.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

/// Account creation request.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub login_method: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl SignupRequest {
    /// A password-based signup.
    pub fn with_password(email: &str, first_name: &str, last_name: &str, password: &str) -> Self {
        Self {
            login_method: "signup".to_string(),
            email: email.to_string(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            password: Some(password.to_string()),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, AuthError> {
    serde_json::to_value(value).map_err(|e| AuthError::Transport(ApiError::Encode(e)))
}

/// The session state machine. Owns no ambient state: registry, store and
/// the outbound ports are injected at construction.
pub struct AuthManager<A> {
    api: A,
    registry: SessionRegistry,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    loading: LoadingGauge,
    confirmation_redirect_delay: Duration,
}

impl<A: ApiClient> AuthManager<A> {
    pub fn new(
        api: A,
        registry: SessionRegistry,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api,
            registry,
            store,
            notifier,
            navigator,
            loading: LoadingGauge::default(),
            confirmation_redirect_delay: CONFIRMATION_REDIRECT_DELAY,
        }
    }

    /// Share a busy gauge with other managers on the same screen.
    pub fn with_loading_gauge(mut self, gauge: LoadingGauge) -> Self {
        self.loading = gauge;
        self
    }

    /// Override the post-confirmation observation delay (tests use zero).
    pub fn with_confirmation_redirect_delay(mut self, delay: Duration) -> Self {
        self.confirmation_redirect_delay = delay;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// Log in with email and password.
    ///
    /// Returns the branch taken by the decision policy; a committed session
    /// has already been persisted and announced to the navigator.
    pub async fn login(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<LoginOutcome, AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.post_accepted("/login", Some(encode(credentials)?)).await?;
        self.resolve_first_factor(envelope, LoginType::password(), Some(credentials.email.clone()))
    }

    /// Log in with an opaque token obtained from a third-party identity SDK.
    pub async fn login_social(
        &self,
        provider: Provider,
        sdk_payload: Value,
    ) -> Result<LoginOutcome, AuthError> {
        let _busy = self.loading.begin();
        let path = format!("/social/{}", provider.as_str());
        let envelope = self.post_accepted(&path, Some(sdk_payload)).await?;
        self.resolve_first_factor(envelope, LoginType::social(provider), None)
    }

    /// Complete a pending challenge with a one-time authenticator code.
    /// The committed session keeps the provenance carried by the challenge.
    pub async fn login_mfa(
        &self,
        challenge: &MfaChallenge,
        code: &str,
    ) -> Result<Session, AuthError> {
        let _busy = self.loading.begin();
        let body = json!({ "email": challenge.email, "otp": code });
        let envelope = self.post_accepted("/login_mfa", Some(body)).await?;
        let user = envelope.user.clone().unwrap_or_default();
        self.commit(user, envelope.auth, challenge.login_type)
    }

    /// Complete a pending challenge by consuming a one-time recovery code.
    pub async fn login_recovery(
        &self,
        challenge: &MfaChallenge,
        recovery_code: &str,
    ) -> Result<Session, AuthError> {
        let _busy = self.loading.begin();
        let body = json!({ "email": challenge.email, "recovery_code": recovery_code });
        let envelope = self.post_accepted("/verify_recovery_code", Some(body)).await?;
        let user = envelope.user.clone().unwrap_or_default();
        self.commit(user, envelope.auth, challenge.login_type)
    }

    /// Create a new account. Does not log in; the server sends a
    /// confirmation email and the caller lands back on the login screen.
    pub async fn signup(&self, request: &SignupRequest) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let envelope = self.post_accepted("/signup", Some(encode(request)?)).await?;
        self.notify_success(&envelope);
        self.navigator.navigate(Route::Login);
        Ok(())
    }

    /// End the session. Server-side invalidation is requested but local
    /// state is cleared regardless of its outcome, so a dead server cannot
    /// pin a client to a stale identity. Idempotent.
    pub async fn logout(&self) -> Result<(), AuthError> {
        match self.api.post("/logout", None).await {
            Ok(envelope) if !envelope.success => {
                tracing::warn!(
                    "Server rejected logout: {}",
                    envelope.message.as_deref().unwrap_or("no message")
                );
            }
            Err(e) => tracing::warn!("Logout request failed in transit: {e}"),
            Ok(_) => {}
        }

        self.store.clear()?;
        self.registry.reset();
        self.navigator.navigate(Route::Login);
        Ok(())
    }

    /// Request a password-reset email.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let envelope = self
            .post_accepted("/forgot_password", Some(json!({ "email": email })))
            .await?;
        self.notify_success(&envelope);
        self.navigator.navigate(Route::LoginWithEmail {
            email: email.to_string(),
        });
        Ok(())
    }

    /// Set a new password using the emailed reset link's token pair.
    pub async fn reset_password(
        &self,
        token: &str,
        uidb: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let path = format!("/reset_password/{token}/{uidb}");
        let envelope = self
            .post_accepted(&path, Some(json!({ "password": password })))
            .await?;
        self.navigator.navigate(Route::Login);
        self.notify_success(&envelope);
        Ok(())
    }

    /// Confirm the account email using the emailed link's token pair, then
    /// commit the session the link's owner just proved.
    pub async fn confirm_email(&self, token: &str, uidb: &str) -> Result<Session, AuthError> {
        let envelope = {
            let _busy = self.loading.begin();
            let path = format!("/verify/{token}/{uidb}");
            self.post_accepted(&path, None).await?
        };

        // Leave the confirmation banner on screen before moving on.
        if !self.confirmation_redirect_delay.is_zero() {
            tokio::time::sleep(self.confirmation_redirect_delay).await;
        }

        let user = envelope.user.clone().unwrap_or_default();
        self.commit(user, None, LoginType::password())
    }

    /// Resend the account confirmation email.
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), AuthError> {
        let _busy = self.loading.begin();
        let envelope = self
            .post_accepted("/resend_confirmation", Some(json!({ "email": email })))
            .await?;
        self.notify_success(&envelope);
        Ok(())
    }

    /// Rehydrate the registry from the persistent store, e.g. after an
    /// application restart. Returns whether a session was restored.
    pub fn restore_session(&self) -> Result<bool, AuthError> {
        match self.store.load()? {
            Some(record) => {
                tracing::info!(
                    saved_at = %record.saved_at,
                    "Restoring persisted session for {}",
                    record.user.email.as_deref().unwrap_or("unknown user")
                );
                self.registry.commit(record.user, record.login_type);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Issue a POST and unwrap the envelope's server-side verdict: a
    /// `success: false` body notifies the sink and aborts with
    /// [`AuthError::ServerRejected`]; transport failures abort without
    /// notification but with a distinguishable error.
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

    /// Shared decision policy for every first-factor entry point.
    fn resolve_first_factor(
        &self,
        envelope: ApiEnvelope,
        login_type: LoginType,
        email: Option<String>,
    ) -> Result<LoginOutcome, AuthError> {
        let user = envelope.user.clone().unwrap_or_default();

        if user.verified == Some(0) {
            self.notifier.notify(Notice::error(
                "Account not verified",
                "Please visit your email and verify the account first",
            ));
            return Ok(LoginOutcome::VerificationRequired { email });
        }

        if user.mfa_enabled {
            let email = envelope
                .auth
                .as_ref()
                .and_then(|auth| auth.email.clone())
                .or(email);
            return Ok(LoginOutcome::MfaRequired(MfaChallenge { email, login_type }));
        }

        let session = self.commit(user, envelope.auth, login_type)?;
        Ok(LoginOutcome::LoggedIn(session))
    }

    /// Commit an authenticated identity: derive the display name, persist
    /// the composite record, update the registry and announce navigation.
    fn commit(
        &self,
        user: UserProfile,
        auth: Option<SocialAuth>,
        login_type: LoginType,
    ) -> Result<Session, AuthError> {
        let mut user = match &auth {
            Some(auth) => social_union(auth, &user),
            None => user,
        };

        user.full_name = Some(match &auth {
            Some(auth) => full_name_from_display(auth.user_name.as_deref().unwrap_or_default()),
            None => full_name_from_parts(user.first_name.as_deref(), user.last_name.as_deref()),
        });

        let token = user
            .access_token
            .clone()
            .ok_or(AuthError::Transport(ApiError::Malformed("user.access_token")))?;

        let record = StoredSession {
            token,
            user,
            login_type,
            saved_at: Utc::now(),
        };
        self.store.save(&record)?;
        self.registry.commit(record.user.clone(), record.login_type);

        tracing::info!(
            "Session established via {} for {}",
            record.login_type,
            record.user.email.as_deref().unwrap_or("unknown user")
        );
        self.navigator.navigate(Route::Dashboard);

        Ok(Session {
            user: record.user,
            login_type: record.login_type,
            token: record.token,
        })
    }

    fn notify_success(&self, envelope: &ApiEnvelope) {
        let message = envelope.message.clone().unwrap_or_default();
        self.notifier.notify(Notice::success("Success", &message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemorySessionStore;
    use crate::auth::types::{LoginKind, NoticeLevel};
    use crate::testing::{RecordingNavigator, RecordingNotifier, StubApi, envelope};
    use serde_json::json;

    struct Harness {
        manager: AuthManager<Arc<StubApi>>,
        api: Arc<StubApi>,
        store: Arc<MemorySessionStore>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness() -> Harness {
        let api = Arc::new(StubApi::new());
        let store = Arc::new(MemorySessionStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = AuthManager::new(
            Arc::clone(&api),
            SessionRegistry::new(),
            store.clone() as Arc<dyn SessionStore>,
            notifier.clone() as Arc<dyn Notifier>,
            navigator.clone() as Arc<dyn Navigator>,
        )
        .with_confirmation_redirect_delay(Duration::ZERO);
        Harness {
            manager,
            api,
            store,
            notifier,
            navigator,
        }
    }

    fn verified_user_envelope() -> crate::api::client::ApiEnvelope {
        envelope(json!({
            "success": true,
            "user": {
                "id": 1,
                "first_name": "A",
                "last_name": "B",
                "email": "a@x.com",
                "verified": 1,
                "mfa_enabled": false,
                "access_token": "tok"
            }
        }))
    }

    #[tokio::test]
    async fn test_password_login_commits_session() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());

        let outcome = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();

        let session = match outcome {
            LoginOutcome::LoggedIn(session) => session,
            other => panic!("expected LoggedIn, got {other:?}"),
        };
        assert_eq!(session.user.full_name.as_deref(), Some("A B"));
        assert_eq!(session.login_type, LoginType::password());
        assert_eq!(session.token, "tok");

        // Registry and store were written as a pair
        assert!(h.manager.registry().is_logged_in());
        assert_eq!(
            h.manager.registry().current_user().full_name.as_deref(),
            Some("A B")
        );
        let stored = h.store.load().unwrap().unwrap();
        assert_eq!(stored.token, "tok");
        assert_eq!(stored.login_type, LoginType::password());
        assert_eq!(stored.user.full_name.as_deref(), Some("A B"));

        assert_eq!(h.navigator.routes(), vec![Route::Dashboard]);
        assert_eq!(
            h.api.calls()[0].path, "/login",
            "password login goes to /login"
        );
    }

    #[tokio::test]
    async fn test_unverified_login_creates_no_session() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "user": { "id": 1, "verified": 0, "mfa_enabled": false }
        })));

        let outcome = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::VerificationRequired {
                email: Some("a@x.com".to_string())
            }
        );
        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
        assert!(h.navigator.routes().is_empty());

        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Account not verified");
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_mfa_enabled_login_returns_challenge() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "user": { "id": 1, "verified": 1, "mfa_enabled": true }
        })));

        let outcome = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();

        let challenge = match outcome {
            LoginOutcome::MfaRequired(challenge) => challenge,
            other => panic!("expected MfaRequired, got {other:?}"),
        };
        assert_eq!(challenge.email.as_deref(), Some("a@x.com"));
        assert_eq!(challenge.login_type, LoginType::password());
        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_social_login_unions_auth_and_user() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "user": {
                "id": 9,
                "email": "ada@x.com",
                "mfa_enabled": false,
                "access_token": "gh-tok"
            },
            "auth": {
                "user_name": "Ada King Lovelace",
                "email": "provider@x.com",
                "scope": "read:user"
            }
        })));

        let outcome = h
            .manager
            .login_social(Provider::Github, json!({ "code": "abc" }))
            .await
            .unwrap();

        let session = match outcome {
            LoginOutcome::LoggedIn(session) => session,
            other => panic!("expected LoggedIn, got {other:?}"),
        };
        assert_eq!(session.login_type, LoginType::social(Provider::Github));
        assert_eq!(session.login_type.kind, LoginKind::Social);
        // Display name split keeps first and last token
        assert_eq!(session.user.full_name.as_deref(), Some("Ada Lovelace"));
        // Server user record wins the union, provider fields survive
        assert_eq!(session.user.email.as_deref(), Some("ada@x.com"));
        assert_eq!(session.user.extra.get("scope"), Some(&json!("read:user")));
        assert_eq!(session.token, "gh-tok");

        assert_eq!(h.api.calls()[0].path, "/social/github");
        let stored = h.store.load().unwrap().unwrap();
        assert_eq!(stored.login_type, LoginType::social(Provider::Github));
    }

    #[tokio::test]
    async fn test_social_mfa_challenge_carries_provider_email() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "user": { "mfa_enabled": true },
            "auth": { "user_name": "Ada Lovelace", "email": "ada@x.com" }
        })));

        let outcome = h
            .manager
            .login_social(Provider::Google, json!({ "token": "t" }))
            .await
            .unwrap();

        match outcome {
            LoginOutcome::MfaRequired(challenge) => {
                assert_eq!(challenge.email.as_deref(), Some("ada@x.com"));
                assert_eq!(challenge.login_type, LoginType::social(Provider::Google));
            }
            other => panic!("expected MfaRequired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_mfa_stamps_provenance_from_challenge() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());

        let challenge = MfaChallenge {
            email: Some("a@x.com".to_string()),
            login_type: LoginType::social(Provider::Facebook),
        };
        let session = h.manager.login_mfa(&challenge, "123456").await.unwrap();

        assert_eq!(session.login_type, LoginType::social(Provider::Facebook));
        assert_eq!(
            h.manager.registry().login_type(),
            Some(LoginType::social(Provider::Facebook))
        );
        let call = &h.api.calls()[0];
        assert_eq!(call.path, "/login_mfa");
        assert_eq!(call.body.as_ref().unwrap()["otp"], json!("123456"));
    }

    #[tokio::test]
    async fn test_login_recovery_consumes_code() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());

        let challenge = MfaChallenge {
            email: Some("a@x.com".to_string()),
            login_type: LoginType::password(),
        };
        let session = h.manager.login_recovery(&challenge, "abcd-efgh").await.unwrap();

        assert_eq!(session.token, "tok");
        let call = &h.api.calls()[0];
        assert_eq!(call.path, "/verify_recovery_code");
        assert_eq!(call.body.as_ref().unwrap()["recovery_code"], json!("abcd-efgh"));
    }

    #[tokio::test]
    async fn test_server_rejection_notifies_and_mutates_nothing() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": false,
            "message": "Invalid credentials."
        })));

        let err = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            AuthError::ServerRejected(message) => assert_eq!(message, "Invalid credentials."),
            other => panic!("expected ServerRejected, got {other:?}"),
        }
        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
        assert_eq!(h.notifier.notices()[0].message, "Invalid credentials.");
    }

    #[tokio::test]
    async fn test_transport_failure_is_distinguishable_and_silent() {
        let h = harness();
        h.api.enqueue_err(ApiError::Status(502));

        let err = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Transport(ApiError::Status(502))));
        assert!(h.notifier.notices().is_empty());
        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_rejects() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());
        h.manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();
        assert!(h.manager.registry().is_logged_in());

        h.api.enqueue_ok(envelope(json!({
            "success": false,
            "message": "session unknown"
        })));
        h.manager.logout().await.unwrap();

        assert!(!h.manager.registry().is_logged_in());
        assert!(h.manager.registry().current_user().is_empty());
        assert!(h.manager.registry().login_type().is_none());
        assert!(h.store.load().unwrap().is_none());
        assert_eq!(h.navigator.routes().last(), Some(&Route::Login));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_when_already_logged_out() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({ "success": true })));
        h.manager.logout().await.unwrap();

        h.api.enqueue_err(ApiError::Status(503));
        h.manager.logout().await.unwrap();

        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_notifies_and_returns_to_login() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "message": "User successfully created and a confirmation email has been sent via email."
        })));

        h.manager
            .signup(&SignupRequest::with_password("a@x.com", "A", "B", "p"))
            .await
            .unwrap();

        assert!(!h.manager.registry().is_logged_in());
        assert_eq!(h.navigator.routes(), vec![Route::Login]);
        assert_eq!(h.notifier.notices()[0].level, NoticeLevel::Success);
        let call = &h.api.calls()[0];
        assert_eq!(call.body.as_ref().unwrap()["login_method"], json!("signup"));
    }

    #[tokio::test]
    async fn test_forgot_password_navigates_with_email() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "message": "Password reset email sent to the user"
        })));

        h.manager.forgot_password("a@x.com").await.unwrap();

        assert_eq!(
            h.navigator.routes(),
            vec![Route::LoginWithEmail {
                email: "a@x.com".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_confirm_email_commits_as_password_login() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());

        let session = h.manager.confirm_email("t0k3n", "dWlk").await.unwrap();

        assert_eq!(session.login_type, LoginType::password());
        assert_eq!(h.api.calls()[0].path, "/verify/t0k3n/dWlk");
        assert!(h.manager.registry().is_logged_in());
        assert_eq!(h.navigator.routes(), vec![Route::Dashboard]);
    }

    #[tokio::test]
    async fn test_reset_password_returns_to_login() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "message": "Your password has been updated! You are now able to log in."
        })));

        h.manager.reset_password("t", "u", "new-pass").await.unwrap();

        assert_eq!(h.api.calls()[0].path, "/reset_password/t/u");
        assert_eq!(h.navigator.routes(), vec![Route::Login]);
        assert!(!h.manager.registry().is_logged_in());
    }

    #[tokio::test]
    async fn test_restore_session_rehydrates_registry() {
        let h = harness();
        h.api.enqueue_ok(verified_user_envelope());
        h.manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap();

        // A fresh registry simulating an application restart over the same store
        let restarted = AuthManager::new(
            Arc::clone(&h.api),
            SessionRegistry::new(),
            h.store.clone() as Arc<dyn SessionStore>,
            h.notifier.clone() as Arc<dyn Notifier>,
            h.navigator.clone() as Arc<dyn Navigator>,
        );
        assert!(!restarted.registry().is_logged_in());

        assert!(restarted.restore_session().unwrap());
        assert!(restarted.registry().is_logged_in());
        assert_eq!(restarted.registry().login_type(), Some(LoginType::password()));
    }

    #[tokio::test]
    async fn test_restore_session_without_record_is_noop() {
        let h = harness();
        assert!(!h.manager.restore_session().unwrap());
        assert!(!h.manager.registry().is_logged_in());
    }

    #[tokio::test]
    async fn test_commit_without_access_token_is_malformed() {
        let h = harness();
        h.api.enqueue_ok(envelope(json!({
            "success": true,
            "user": { "id": 1, "verified": 1, "mfa_enabled": false }
        })));

        let err = h
            .manager
            .login(&PasswordCredentials {
                email: "a@x.com".to_string(),
                password: "p".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Transport(ApiError::Malformed("user.access_token"))
        ));
        assert!(!h.manager.registry().is_logged_in());
        assert!(h.store.load().unwrap().is_none());
    }
}
