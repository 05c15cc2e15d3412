use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

/// Default identity API URL
const DEFAULT_API_URL: &str = "https://vestibule.app/api";

/// Environment variable name for API URL override
const ENV_API_URL: &str = "VESTIBULE_API_URL";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    api: Option<ApiConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfig {
    /// API endpoint URL (e.g., "https://your-instance.example.com/api")
    url: Option<String>,
}

/// Runtime API endpoint configuration
#[derive(Debug, Clone)]
pub struct ApiEndpointConfig {
    /// Base URL for API calls
    pub api_url: String,
    /// Source of the configuration (for logging)
    pub source: ConfigSource,
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("vestibule").join("config.toml"))
}

/// Trim whitespace and trailing slashes; empty values count as absent.
fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load API endpoint configuration with priority:
/// 1. Environment variable (VESTIBULE_API_URL)
/// 2. Config file (~/.config/vestibule/config.toml)
/// 3. Default values
pub fn load_api_config() -> ApiEndpointConfig {
    // Priority 1: Environment variable
    if let Some(url) = std::env::var(ENV_API_URL).ok().as_deref().and_then(normalize_url) {
        tracing::info!("Using API URL from environment variable: {}", url);
        return ApiEndpointConfig {
            api_url: url,
            source: ConfigSource::Environment,
        };
    }

    // Priority 2: Config file
    if let Some(config) = load_config_file() {
        if let Some(url) = config
            .api
            .and_then(|api| api.url)
            .as_deref()
            .and_then(normalize_url)
        {
            tracing::info!("Using API URL from config file: {}", url);
            return ApiEndpointConfig {
                api_url: url,
                source: ConfigSource::ConfigFile,
            };
        }
    }

    // Priority 3: Default values
    tracing::debug!("Using default API URL: {}", DEFAULT_API_URL);
    ApiEndpointConfig {
        api_url: DEFAULT_API_URL.to_string(),
        source: ConfigSource::Default,
    }
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/vestibule/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Vestibule Configuration
# Place this file at: ~/.config/vestibule/config.toml

[api]
# Identity API endpoint URL for self-hosted instances
# Default: https://vestibule.app/api
# url = "https://your-instance.example.com/api"
"#
    .to_string()
}
