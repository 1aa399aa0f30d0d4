//! Auto-run stepping loop
//!
//! Event driven, not a timer: every published state change re-checks
//! `auto_run && !generating && last_error.is_none()` and, when it holds, runs
//! one orchestrator step. Chained steps inside that step keep the gate closed,
//! so the loop never interleaves with them.

use super::orchestrator::{OrchestratorError, TurnOrchestrator};
use crate::conversation::ConversationStore;
use crate::generation::Generator;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn ready(store: &ConversationStore) -> bool {
    let status = store.status();
    status.auto_run && !status.generating && status.last_error.is_none()
}

/// Start the loop for one session; it stops when `shutdown` is cancelled
pub fn spawn<G>(orchestrator: TurnOrchestrator<G>, shutdown: CancellationToken) -> JoinHandle<()>
where
    G: Generator + ?Sized + 'static,
{
    tokio::spawn(async move {
        run(orchestrator, shutdown).await;
    })
}

async fn run<G: Generator + ?Sized>(orchestrator: TurnOrchestrator<G>, shutdown: CancellationToken) {
    let session_id = orchestrator.session().id().to_string();
    let mut events = orchestrator.session().subscribe();
    tracing::debug!(session_id = %session_id, "Auto-run loop started");

    while !shutdown.is_cancelled() {
        if orchestrator.session().read(ready) {
            match orchestrator.step().await {
                // A user action got the gate first; its own changes re-trigger us
                Ok(_) | Err(OrchestratorError::Busy) => {}
                Err(e) => {
                    tracing::info!(session_id = %session_id, error = %e, "Auto-run paused on error");
                }
            }
            continue;
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!(session_id = %session_id, "Auto-run loop stopped");
}
