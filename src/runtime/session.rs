//! Per-conversation session
//!
//! Owns one conversation store behind a lock and publishes a snapshot after
//! every mutation. Nothing is shared between sessions.

use crate::conversation::{ConversationStatus, ConversationStore, Turn};
use crate::state_machine::Step;
use crate::steering::SteeringMagnitudes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Everything the UI renders from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
    pub status: ConversationStatus,
    pub steering: SteeringMagnitudes,
}

/// Published to subscribers (SSE clients and the auto-run loop)
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Any observable state change
    Changed(Box<SessionSnapshot>),
    /// A generation step is about to call the backend
    StepStarted(Step),
}

struct Inner {
    store: ConversationStore,
    steering: SteeringMagnitudes,
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: id.into(),
            created_at: Utc::now(),
            inner: Mutex::new(Inner {
                store: ConversationStore::new(),
                steering: SteeringMagnitudes::new(),
            }),
            events,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, inner: &Inner) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            turns: inner.store.turns().to_vec(),
            status: inner.store.status().clone(),
            steering: inner.steering.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        self.snapshot_of(&inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn read<R>(&self, f: impl FnOnce(&ConversationStore) -> R) -> R {
        f(&self.lock().store)
    }

    /// Apply one mutation and publish the resulting snapshot.
    ///
    /// The event is sent while the lock is held so subscribers see changes in
    /// the order they were made.
    pub fn update<R>(&self, f: impl FnOnce(&mut ConversationStore) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner.store);
        self.publish(&inner);
        result
    }

    fn publish(&self, inner: &Inner) {
        // No receivers is fine
        let _ = self
            .events
            .send(SessionEvent::Changed(Box::new(self.snapshot_of(inner))));
    }

    pub fn publish_step(&self, step: Step) {
        let _ = self.events.send(SessionEvent::StepStarted(step));
    }

    pub fn steering(&self) -> SteeringMagnitudes {
        self.lock().steering.clone()
    }

    pub fn set_steering(&self, steering: SteeringMagnitudes) {
        let mut inner = self.lock();
        inner.steering = steering;
        self.publish(&inner);
    }

    pub fn set_auto_run(&self, enabled: bool) {
        self.update(|store| store.set_auto_run(enabled));
    }

    /// Returns whether the value was in range and applied
    pub fn set_token_budget(&self, value: i64) -> bool {
        let mut inner = self.lock();
        let accepted = inner.store.set_token_budget(value);
        if accepted {
            self.publish(&inner);
        }
        accepted
    }

    /// Start over. Also drops `last_error`, so a paused auto-run resumes.
    pub fn clear(&self) {
        self.update(|store| {
            store.clear();
            store.set_error(None);
        });
    }

    pub fn pop_last_turn(&self) -> Option<Turn> {
        self.update(ConversationStore::pop_last_turn)
    }

    pub fn dismiss_error(&self) {
        self.update(|store| store.set_error(None));
    }

    /// Check-and-set the `generating` gate.
    ///
    /// Returns `None` without touching anything when a generation is already
    /// running. On success the previous error is cleared.
    pub fn begin_generation(&self) -> Option<GenerationGuard<'_>> {
        let mut inner = self.lock();
        if inner.store.status().generating {
            return None;
        }
        inner.store.set_generating(true);
        inner.store.set_error(None);
        self.publish(&inner);
        Some(GenerationGuard {
            session: self,
            finished: false,
        })
    }
}

/// Holds the `generating` gate; releasing it is guaranteed even if the
/// operation future is dropped or panics.
pub struct GenerationGuard<'a> {
    session: &'a Session,
    finished: bool,
}

impl GenerationGuard<'_> {
    /// Record the outcome and release the gate in one mutation
    pub fn finish(mut self, error: Option<String>) {
        self.release(error);
        self.finished = true;
    }

    fn release(&self, error: Option<String>) {
        self.session.update(|store| {
            if error.is_some() {
                store.set_error(error);
            }
            store.set_continuation_target(None);
            store.set_generating(false);
        });
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release(None);
        }
    }
}
