//! HTTP client for the stateless generation backend

use super::config::BackendConfig;
use super::types::{BackendHealth, BackendInfo, GenerationRequest, GenerationResponse};
use super::{GenerationError, Generator};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Talks to the backend's `/api/generate`, `/` and `/api/info` endpoints.
///
/// No request timeout is set: a generation call waits for as long as the
/// backend takes.
pub struct HttpGenerator {
    client: Client,
    config: BackendConfig,
}

impl HttpGenerator {
    pub fn new(config: BackendConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GenerationError::unknown(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GenerationError> {
        let response = self
            .client
            .get(self.config.endpoint(path))
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }
}

fn send_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        GenerationError::network(format!("Connection failed: {e}"))
    } else {
        GenerationError::unknown(format!("Request failed: {e}"))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GenerationError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GenerationError::network(format!("Failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(GenerationError::from_status(status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| GenerationError::decode(format!("Failed to parse response: {e} - body: {body}")))
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let response = self
            .client
            .post(self.config.endpoint("/api/generate"))
            .json(request)
            .send()
            .await
            .map_err(send_error)?;
        read_json(response).await
    }

    async fn health(&self) -> Result<BackendHealth, GenerationError> {
        self.get_json("/").await
    }

    async fn info(&self) -> Result<BackendInfo, GenerationError> {
        self.get_json("/api/info").await
    }
}
