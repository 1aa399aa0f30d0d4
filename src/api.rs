//! HTTP API for the steering chat UI
//!
//! Every action answers with the session snapshot it left behind; live
//! updates arrive over the per-session SSE stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::generation::Generator;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(generator)),
        }
    }
}
