//! Shared types for the credential exchange protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::client::ApiError;
use crate::auth::store::StoreError;

/// How a session was (or is being) established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginKind {
    Normal,
    Social,
}

/// Identity provider behind a login method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Signup,
    Google,
    Github,
    Linkedin,
    Facebook,
}

impl Provider {
    /// Wire name used in route paths and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Signup => "signup",
            Provider::Google => "google",
            Provider::Github => "github",
            Provider::Linkedin => "linkedin",
            Provider::Facebook => "facebook",
        }
    }

    /// Parse a provider from its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "signup" => Some(Provider::Signup),
            "google" => Some(Provider::Google),
            "github" => Some(Provider::Github),
            "linkedin" => Some(Provider::Linkedin),
            "facebook" => Some(Provider::Facebook),
            _ => None,
        }
    }
}

/// Provenance of an established session: password signup or one of the
/// social providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginType {
    #[serde(rename = "type")]
    pub kind: LoginKind,
    pub provider: Provider,
}

impl LoginType {
    /// The password/signup login method.
    pub fn password() -> Self {
        Self {
            kind: LoginKind::Normal,
            provider: Provider::Signup,
        }
    }

    /// A third-party provider login method.
    pub fn social(provider: Provider) -> Self {
        Self {
            kind: LoginKind::Social,
            provider,
        }
    }
}

impl std::fmt::Display for LoginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            LoginKind::Normal => write!(f, "password"),
            LoginKind::Social => write!(f, "{}", self.provider.as_str()),
        }
    }
}

/// Profile fields reported by the identity API.
///
/// Social logins union provider-specific fields into the same record; those
/// ride in `extra` so nothing reported by the server is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 0 or 1 as reported by the server; only an explicit 0 blocks login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<i64>,
    #[serde(default)]
    pub mfa_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// True when no server-reported field is present.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.access_token.is_none()
            && self.extra.is_empty()
    }
}

/// Provider-side identity attached to a social login response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A third-party identity linked to the account, as listed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedAccount {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub profile: LinkedProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedProfile {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A committed authenticated session, handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: UserProfile,
    pub login_type: LoginType,
    pub token: String,
}

/// A pending second-factor step. Transient: returned to the caller and
/// carried back into `login_mfa`/`login_recovery`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MfaChallenge {
    pub email: Option<String>,
    pub login_type: LoginType,
}

/// Result of a first-factor credential exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Session committed and persisted.
    LoggedIn(Session),
    /// A second factor is required before a session can be committed.
    MfaRequired(MfaChallenge),
    /// The account's email address has not been confirmed yet; the caller
    /// should offer to resend the confirmation link.
    VerificationRequired { email: Option<String> },
}

/// Errors surfaced by the credential exchange and MFA protocols.
///
/// A server that answered with `success: false` is `ServerRejected`; a
/// request that never produced a well-formed envelope is `Transport`. The
/// two are deliberately distinguishable to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    ServerRejected(String),

    #[error("transport failure: {0}")]
    Transport(#[from] ApiError),

    #[error("session storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Severity of an outcome message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Human-readable outcome message delivered to the notification sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            level: NoticeLevel::Success,
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            level: NoticeLevel::Error,
        }
    }
}

/// Outbound port for outcome messages. The embedding application decides
/// how (or whether) to present them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Navigation targets requested by the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Authenticated landing area, entered after a session commit.
    Dashboard,
    /// Unauthenticated entry point.
    Login,
    /// Unauthenticated entry point with a prefilled email address.
    LoginWithEmail { email: String },
}

/// Outbound port for navigation requests.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Reference-counted busy indicator shared across protocol operations.
///
/// Each in-flight operation holds a [`LoadingGuard`]; the gauge reads busy
/// while any guard is alive, so overlapping calls cannot unmask each other.
#[derive(Debug, Clone, Default)]
pub struct LoadingGauge(Arc<AtomicUsize>);

impl LoadingGauge {
    pub fn begin(&self) -> LoadingGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(Arc::clone(&self.0))
    }

    pub fn is_loading(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }
}

/// Released on drop, success and failure paths alike.
#[derive(Debug)]
pub struct LoadingGuard(Arc<AtomicUsize>);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn to_map<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Field-wise union of a social login response: the provider identity
/// first, overlaid by the server's user record.
pub fn social_union(auth: &SocialAuth, user: &UserProfile) -> UserProfile {
    let mut merged = to_map(auth);
    for (key, value) in to_map(user) {
        merged.insert(key, value);
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

/// Full name for password accounts: first and last name joined by a space.
pub fn full_name_from_parts(first: Option<&str>, last: Option<&str>) -> String {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    parts.join(" ")
}

/// Full name for social accounts, derived from the provider's display name:
/// first and last whitespace-separated tokens. A single-token display name
/// is used as-is.
pub fn full_name_from_display(display: &str) -> String {
    let mut tokens = display.split_whitespace();
    let first = match tokens.next() {
        Some(token) => token,
        None => return String::new(),
    };
    match tokens.last() {
        Some(last) => format!("{first} {last}"),
        None => first.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_type_wire_shape() {
        let login_type = LoginType::social(Provider::Github);
        let value = serde_json::to_value(login_type).unwrap();
        assert_eq!(value, json!({ "type": "social", "provider": "github" }));

        let parsed: LoginType =
            serde_json::from_value(json!({ "type": "normal", "provider": "signup" })).unwrap();
        assert_eq!(parsed, LoginType::password());
    }

    #[test]
    fn test_provider_round_trip_names() {
        for provider in [
            Provider::Signup,
            Provider::Google,
            Provider::Github,
            Provider::Linkedin,
            Provider::Facebook,
        ] {
            assert_eq!(Provider::from_name(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::from_name("myspace"), None);
    }

    #[test]
    fn test_user_profile_keeps_unknown_fields() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": 7,
            "email": "a@x.com",
            "verified": 1,
            "mfa_enabled": false,
            "avatar_url": "https://example.com/a.png"
        }))
        .unwrap();
        assert_eq!(profile.id, Some(7));
        assert_eq!(profile.verified, Some(1));
        assert_eq!(
            profile.extra.get("avatar_url"),
            Some(&json!("https://example.com/a.png"))
        );
    }

    #[test]
    fn test_social_union_user_wins_over_auth() {
        let auth: SocialAuth = serde_json::from_value(json!({
            "user_name": "Ada Lovelace",
            "email": "provider@x.com",
            "scope": "read:user"
        }))
        .unwrap();
        let user: UserProfile = serde_json::from_value(json!({
            "id": 3,
            "email": "account@x.com",
            "mfa_enabled": false,
            "access_token": "tok"
        }))
        .unwrap();

        let merged = social_union(&auth, &user);
        assert_eq!(merged.email.as_deref(), Some("account@x.com"));
        assert_eq!(merged.id, Some(3));
        assert_eq!(merged.access_token.as_deref(), Some("tok"));
        assert_eq!(merged.extra.get("user_name"), Some(&json!("Ada Lovelace")));
        assert_eq!(merged.extra.get("scope"), Some(&json!("read:user")));
    }

    #[test]
    fn test_social_union_absent_user_fields_do_not_clobber() {
        let auth: SocialAuth =
            serde_json::from_value(json!({ "email": "provider@x.com" })).unwrap();
        let user: UserProfile =
            serde_json::from_value(json!({ "mfa_enabled": true })).unwrap();

        let merged = social_union(&auth, &user);
        assert_eq!(merged.email.as_deref(), Some("provider@x.com"));
        assert!(merged.mfa_enabled);
    }

    #[test]
    fn test_full_name_from_parts() {
        assert_eq!(full_name_from_parts(Some("A"), Some("B")), "A B");
        assert_eq!(full_name_from_parts(Some("A"), None), "A");
        assert_eq!(full_name_from_parts(None, None), "");
    }

    #[test]
    fn test_full_name_from_display_takes_first_and_last_token() {
        assert_eq!(full_name_from_display("Ada Lovelace"), "Ada Lovelace");
        assert_eq!(full_name_from_display("Ada King Lovelace"), "Ada Lovelace");
        assert_eq!(full_name_from_display("Ada"), "Ada");
        assert_eq!(full_name_from_display(""), "");
        assert_eq!(full_name_from_display("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_loading_gauge_counts_overlapping_operations() {
        let gauge = LoadingGauge::default();
        assert!(!gauge.is_loading());

        let first = gauge.begin();
        let second = gauge.begin();
        assert!(gauge.is_loading());

        drop(first);
        assert!(gauge.is_loading());
        drop(second);
        assert!(!gauge.is_loading());
    }

    #[test]
    fn test_auth_error_display_is_distinguishable() {
        let rejected = AuthError::ServerRejected("Invalid token.".to_string());
        assert_eq!(rejected.to_string(), "Invalid token.");
        assert!(matches!(rejected, AuthError::ServerRejected(_)));

        let transport = AuthError::Transport(ApiError::Status(502));
        assert!(transport.to_string().contains("transport failure"));
        assert!(!matches!(transport, AuthError::ServerRejected(_)));
    }
}
