//! Identity API module.
//!
//! Provides the HTTP client for the remote identity API and its endpoint
//! configuration.

pub mod client;
pub mod config;

pub use client::{ApiClient, ApiEnvelope, ApiError, HttpApiClient};
pub use config::{ApiEndpointConfig, ConfigSource, load_api_config};
