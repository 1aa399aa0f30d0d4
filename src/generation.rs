//! Generation collaborator
//!
//! The backend is a stateless "generate the next speaker's continuation"
//! service. It is speaker-agnostic: it always writes as the assistant of a
//! user/assistant transcript, and the orchestrator shapes the transcript to
//! get the speaker it wants.

mod config;
mod error;
mod http;
mod types;

pub use config::BackendConfig;
pub use error::GenerationError;
pub use http::HttpGenerator;
pub use types::*;

use async_trait::async_trait;
use std::time::Instant;

/// Common interface for generation backends
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a continuation of the transcript
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, GenerationError>;

    /// Liveness of the backend
    async fn health(&self) -> Result<BackendHealth, GenerationError> {
        Err(GenerationError::unknown("health check not supported"))
    }

    /// Model and PCA metadata
    async fn info(&self) -> Result<BackendInfo, GenerationError> {
        Err(GenerationError::unknown("backend info not supported"))
    }
}

/// Logging wrapper for generators
pub struct LoggingGenerator<G> {
    inner: G,
}

impl<G: Generator> LoggingGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: Generator> Generator for LoggingGenerator<G> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    num_tokens = request.num_tokens,
                    is_partial = request.is_partial,
                    steered_pcs = request.steering_config.pc_values.len(),
                    terminating = response.terminating,
                    "Generation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Generation failed"
                );
            }
        }

        result
    }

    async fn health(&self) -> Result<BackendHealth, GenerationError> {
        self.inner.health().await
    }

    async fn info(&self) -> Result<BackendInfo, GenerationError> {
        self.inner.info().await
    }
}
