//! HTTP client for the identity API.
//!
//! Every endpoint answers with the same tagged envelope; server-reported
//! failures arrive as `success: false` inside a parseable body and are NOT
//! transport errors. The concrete client attaches the stored bearer token
//! to each outgoing request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::api::config::load_api_config;
use crate::auth::store::SessionStore;
use crate::auth::types::{LinkedAccount, SocialAuth, UserProfile};

/// Errors raised before a well-formed envelope was obtained. Distinct from
/// server-reported failures, which arrive inside an envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned error: {0}")]
    Status(u16),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed response: missing {0}")]
    Malformed(&'static str),
}

/// Tagged response envelope shared by every identity endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub auth: Option<SocialAuth>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub login_methods: Option<Vec<LinkedAccount>>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Transport seam of the credential exchange protocol.
///
/// The production implementation is [`HttpApiClient`]; tests script a stub.
pub trait ApiClient: Send + Sync {
    fn post(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> impl Future<Output = Result<ApiEnvelope, ApiError>> + Send;

    fn get(&self, path: &str) -> impl Future<Output = Result<ApiEnvelope, ApiError>> + Send;

    fn delete(&self, path: &str) -> impl Future<Output = Result<ApiEnvelope, ApiError>> + Send;
}

impl<A: ApiClient> ApiClient for Arc<A> {
    async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiEnvelope, ApiError> {
        (**self).post(path, body).await
    }

    async fn get(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        (**self).get(path).await
    }

    async fn delete(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        (**self).delete(path).await
    }
}

/// Reqwest-backed API client with per-request bearer injection.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    http: reqwest::Client,
    store: Arc<dyn SessionStore>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            store,
        })
    }

    /// Client pointed at the configured endpoint (env var, config file, or
    /// compiled default).
    pub fn from_config(store: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let config = load_api_config();
        Self::new(config.api_url, store)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> Option<String> {
        match self.store.load() {
            Ok(Some(session)) => Some(session.token),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read stored token for request: {e}");
                None
            }
        }
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<ApiEnvelope, ApiError> {
        let request = match self.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        // The server reports domain failures inside a parseable body, often
        // with a non-2xx status. Any parseable body is an envelope; only an
        // unparsable one is a transport error.
        match response.json::<ApiEnvelope>().await {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(ApiError::Http(e)),
            Err(_) => Err(ApiError::Status(status.as_u16())),
        }
    }
}

impl ApiClient for HttpApiClient {
    async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiEnvelope, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.dispatch(request).await
    }

    async fn get(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        let url = format!("{}{path}", self.base_url);
        self.dispatch(self.http.get(&url)).await
    }

    async fn delete(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        let url = format!("{}{path}", self.base_url);
        self.dispatch(self.http.delete(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_parses_password_login_response() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "success": true,
            "user": {
                "id": 1,
                "first_name": "A",
                "last_name": "B",
                "verified": 1,
                "mfa_enabled": false,
                "access_token": "tok"
            }
        }))
        .unwrap();

        assert!(envelope.success);
        let user = envelope.user.unwrap();
        assert_eq!(user.access_token.as_deref(), Some("tok"));
        assert_eq!(user.verified, Some(1));
        assert!(!user.mfa_enabled);
    }

    #[test]
    fn test_envelope_parses_social_mfa_response() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "success": true,
            "user": { "mfa_enabled": true },
            "auth": { "user_name": "Ada Lovelace", "email": "ada@x.com", "name": "github" }
        }))
        .unwrap();

        assert!(envelope.user.unwrap().mfa_enabled);
        let auth = envelope.auth.unwrap();
        assert_eq!(auth.email.as_deref(), Some("ada@x.com"));
        assert_eq!(auth.extra.get("name"), Some(&json!("github")));
    }

    #[test]
    fn test_envelope_parses_failure_message() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "success": false,
            "message": "User already exists."
        }))
        .unwrap();

        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("User already exists."));
        assert!(envelope.user.is_none());
    }

    #[test]
    fn test_envelope_parses_linked_account_list() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({
            "success": true,
            "login_methods": [
                {
                    "provider": "github",
                    "profile": {
                        "entity_id": "9f2c",
                        "user_name": "Ada Lovelace",
                        "email": "ada@x.com",
                        "scope": "read:user"
                    }
                }
            ]
        }))
        .unwrap();

        let accounts = envelope.login_methods.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider.as_deref(), Some("github"));
        assert_eq!(accounts[0].profile.entity_id, "9f2c");
    }

    #[test]
    fn test_envelope_defaults_missing_fields() {
        let envelope: ApiEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(!envelope.success);
        assert!(envelope.message.is_none());
    }
}
