//! Mock implementations for testing
//!
//! These mocks enable orchestrator and API tests without a real backend.

use super::session::{Session, SessionEvent, SessionSnapshot};
use crate::generation::{
    BackendHealth, BackendInfo, GenerationError, GenerationRequest, GenerationResponse, Generator,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Generator
// ============================================================================

/// Generator that returns queued responses and records every request
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<GenerationResponse, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_response(&self, content: &str, terminating: bool) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(GenerationResponse::new(content, terminating)));
    }

    pub fn queue_error(&self, error: GenerationError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::network("No mock response queued")))
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.next(request)
    }

    async fn health(&self) -> Result<BackendHealth, GenerationError> {
        Ok(BackendHealth {
            status: "running".to_string(),
            model_loaded: true,
            pca_loaded: true,
        })
    }

    async fn info(&self) -> Result<BackendInfo, GenerationError> {
        Ok(BackendInfo {
            model_name: Some("mock-model".to_string()),
            steering_layer: Some(22),
            num_pca_components: 10,
            ..BackendInfo::default()
        })
    }
}

// ============================================================================
// Gated Generator (for busy-gate testing)
// ============================================================================

/// Generator that blocks each call until the test releases it
pub struct GatedGenerator {
    inner: MockGenerator,
    /// Signalled (with a stored permit) when a request arrives
    pub started: Notify,
    /// Signal to let the pending request complete
    pub release: Notify,
}

impl GatedGenerator {
    pub fn new() -> Self {
        Self {
            inner: MockGenerator::new(),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn queue_response(&self, content: &str, terminating: bool) {
        self.inner.queue_response(content, terminating);
    }
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.next(request)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Wait until a snapshot satisfies `predicate`, or give up after `timeout`
pub async fn wait_for_snapshot(
    session: &Session,
    timeout: Duration,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> bool {
    let mut rx = session.subscribe();
    if predicate(&session.snapshot()) {
        return true;
    }
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::Changed(snapshot)) if predicate(&snapshot) => return true,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if predicate(&session.snapshot()) {
                        return true;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_request() -> GenerationRequest {
        GenerationRequest {
            messages: vec![],
            steering_config: Default::default(),
            num_tokens: 10,
            is_partial: false,
        }
    }

    #[tokio::test]
    async fn test_mock_generator() {
        let mock = MockGenerator::new();
        mock.queue_response("Hello", true);

        let response = mock.generate(&empty_request()).await.unwrap();
        assert_eq!(response.content, "Hello");
        assert!(response.terminating);

        // Second call should fail (no more responses)
        assert!(mock.generate(&empty_request()).await.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }
}
