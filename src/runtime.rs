//! Runtime for conversation sessions
//!
//! One `Session` per conversation, each with its own orchestrator and
//! auto-run loop. Sessions never share state.

mod auto_run;
mod orchestrator;
mod session;

#[cfg(test)]
pub mod testing;

pub use orchestrator::{OrchestratorError, TurnOrchestrator};
pub use session::{Session, SessionEvent, SessionSnapshot};

use crate::generation::Generator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Orchestrator over whichever backend the server was started with
pub type ProductionOrchestrator = TurnOrchestrator<dyn Generator>;

/// Manager for all live sessions
pub struct SessionManager {
    generator: Arc<dyn Generator>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

struct SessionHandle {
    orchestrator: ProductionOrchestrator,
    shutdown: CancellationToken,
}

/// Row in the session listing
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub turns: usize,
    pub generating: bool,
    pub auto_run: bool,
}

impl SessionManager {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Create an empty session and start its auto-run loop
    pub async fn create(&self) -> ProductionOrchestrator {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone()));
        let orchestrator = TurnOrchestrator::new(session, Arc::clone(&self.generator));
        let shutdown = CancellationToken::new();
        auto_run::spawn(orchestrator.clone(), shutdown.clone());

        tracing::info!(session_id = %id, "Session created");
        self.sessions.write().await.insert(
            id,
            SessionHandle {
                orchestrator: orchestrator.clone(),
                shutdown,
            },
        );
        orchestrator
    }

    pub async fn get(&self, id: &str) -> Option<ProductionOrchestrator> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|handle| handle.orchestrator.clone())
    }

    /// Drop a session and stop its loop. An in-flight generation still runs
    /// to completion; its result lands in a session nobody can reach.
    pub async fn remove(&self, id: &str) -> bool {
        let Some(handle) = self.sessions.write().await.remove(id) else {
            return false;
        };
        handle.shutdown.cancel();
        tracing::info!(session_id = %id, "Session removed");
        true
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|handle| {
                let session = handle.orchestrator.session();
                session.read(|store| SessionSummary {
                    id: session.id().to_string(),
                    created_at: session.created_at(),
                    turns: store.turns().len(),
                    generating: store.status().generating,
                    auto_run: store.status().auto_run,
                })
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for handle in self.sessions.get_mut().values() {
            handle.shutdown.cancel();
        }
    }
}
