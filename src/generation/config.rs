//! Backend connection settings

use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backend URL is empty")]
    EmptyBackendUrl,
    #[error("backend URL must start with http:// or https://: {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    base_url: String,
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBackendUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::UnsupportedScheme(base_url.to_string()));
        }
        Ok(Self {
            base_url: base_url.to_string(),
        })
    }

    /// Reads `STEER_BACKEND_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("STEER_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        Self::new(&url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
