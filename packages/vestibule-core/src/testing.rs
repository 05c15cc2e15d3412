//! Scripted fakes for exercising the protocol without a server.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature,
//! for integration tests of embedding applications.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::api::client::{ApiClient, ApiEnvelope, ApiError};
use crate::auth::types::{Navigator, Notice, Notifier, Route};

/// Build an envelope from wire-shaped JSON.
pub fn envelope(value: Value) -> ApiEnvelope {
    serde_json::from_value(value).expect("test envelope must be wire-shaped")
}

/// One request observed by the stub.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// API client that replays queued responses in order and records every
/// request it sees.
#[derive(Default)]
pub struct StubApi {
    responses: Mutex<VecDeque<Result<ApiEnvelope, ApiError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_ok(&self, envelope: ApiEnvelope) {
        self.responses.lock().unwrap().push_back(Ok(envelope));
    }

    pub fn enqueue_err(&self, error: ApiError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn dispatch(&self, method: &'static str, path: &str, body: Option<Value>) -> Result<ApiEnvelope, ApiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {method} {path}"))
    }
}

impl ApiClient for StubApi {
    async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiEnvelope, ApiError> {
        self.dispatch("POST", path, body)
    }

    async fn get(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        self.dispatch("GET", path, None)
    }

    async fn delete(&self, path: &str) -> Result<ApiEnvelope, ApiError> {
        self.dispatch("DELETE", path, None)
    }
}

/// Notification sink that remembers everything it was told.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Navigation port that remembers every requested route.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}
