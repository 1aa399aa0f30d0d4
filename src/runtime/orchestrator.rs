//! Turn orchestrator
//!
//! Each public operation is one transaction: take the `generating` gate,
//! validate against the current log, then run its steps strictly in order
//! (a finished synthetic human turn chains into a model reply) before the
//! gate is released. A failure is recorded as `last_error` and the log is
//! rolled back to where it stood when the operation began.

use super::session::Session;
use crate::conversation::{ConversationStore, Speaker, Termination, Turn};
use crate::generation::{GenerationError, Generator};
use crate::state_machine::transcript::build_request;
use crate::state_machine::{decide, Step};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Another operation holds the gate; nothing was changed
    #[error("a generation is already in progress")]
    Busy,
    #[error("message text is empty")]
    EmptyMessage,
    #[error("cannot reply without a preceding human turn")]
    NoPrecedingHumanTurn,
    #[error("turn {index} is not eligible for continuation")]
    NotContinuable { index: usize },
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub struct TurnOrchestrator<G: ?Sized> {
    session: Arc<Session>,
    generator: Arc<G>,
}

impl<G: ?Sized> Clone for TurnOrchestrator<G> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<G: Generator + ?Sized> TurnOrchestrator<G> {
    pub fn new(session: Arc<Session>, generator: Arc<G>) -> Self {
        Self { session, generator }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn generator(&self) -> &Arc<G> {
        &self.generator
    }

    /// Append a typed human turn and get the model's reply to it
    pub async fn send_human_turn(&self, text: &str) -> Result<Step, OrchestratorError> {
        let text = text.to_string();
        self.transact("send_human_turn", move |store| {
            if text.trim().is_empty() {
                return Err(OrchestratorError::EmptyMessage);
            }
            commit_new_turn(store, Turn::human(text));
            Ok(Step::ModelReply)
        })
        .await
    }

    pub async fn generate_model_reply(&self) -> Result<Step, OrchestratorError> {
        self.transact("generate_model_reply", |_| Ok(Step::ModelReply))
            .await
    }

    pub async fn generate_synthetic_human_turn(&self) -> Result<Step, OrchestratorError> {
        self.transact("generate_synthetic_human_turn", |_| {
            Ok(Step::SyntheticHumanTurn)
        })
        .await
    }

    pub async fn continue_turn(&self, index: usize) -> Result<Step, OrchestratorError> {
        self.transact("continue_turn", move |_| Ok(Step::Continue { index }))
            .await
    }

    /// Whatever the decision table says comes next
    pub async fn step(&self) -> Result<Step, OrchestratorError> {
        self.transact("step", |store| Ok(decide(store.turns())))
            .await
    }

    async fn transact<F>(&self, operation: &'static str, plan: F) -> Result<Step, OrchestratorError>
    where
        F: FnOnce(&mut ConversationStore) -> Result<Step, OrchestratorError>,
    {
        let Some(guard) = self.session.begin_generation() else {
            tracing::debug!(session_id = %self.session.id(), operation, "Generation in progress, ignoring");
            return Err(OrchestratorError::Busy);
        };

        // Checkpoint under the same lock as the plan, so a clear landing
        // between the two cannot go unnoticed
        let planned = self.session.update(|store| {
            let checkpoint = store.checkpoint();
            plan(store).map(|first| (first, checkpoint))
        });

        let result = match planned {
            Ok((first, checkpoint)) => match self.run(first, checkpoint.epoch()).await {
                Ok(()) => Ok(first),
                Err(e) => {
                    if self.session.update(|store| store.rollback(checkpoint)) {
                        tracing::debug!(session_id = %self.session.id(), operation, "Turn log rolled back");
                    }
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        match &result {
            Ok(step) => {
                tracing::info!(
                    session_id = %self.session.id(),
                    operation,
                    step = %step,
                    turns = self.session.read(|store| store.turns().len()),
                    "Operation completed"
                );
                guard.finish(None);
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session.id(),
                    operation,
                    error = %e,
                    "Operation failed"
                );
                guard.finish(Some(e.to_string()));
            }
        }

        result
    }

    async fn run(&self, first: Step, epoch: u64) -> Result<(), OrchestratorError> {
        let mut next = Some(first);
        while let Some(step) = next {
            self.session.publish_step(step);
            next = self.execute(step, epoch).await?;
        }
        Ok(())
    }

    /// Run one step; returns the step chained after it, if any
    async fn execute(&self, step: Step, epoch: u64) -> Result<Option<Step>, OrchestratorError> {
        match step {
            Step::ModelReply => self.model_reply(epoch).await,
            Step::SyntheticHumanTurn => self.synthetic_human_turn(epoch).await,
            Step::Continue { index } => self.continue_in_place(index, epoch).await,
        }
    }

    async fn model_reply(&self, epoch: u64) -> Result<Option<Step>, OrchestratorError> {
        let steering = self.session.steering();
        let request = self.session.read(|store| match store.last_turn() {
            _ if store.epoch() != epoch => Ok(None),
            Some(last) if last.speaker() == Speaker::Human => Ok(Some(build_request(
                store.turns(),
                Speaker::Model,
                false,
                store.status().token_budget,
                &steering,
            ))),
            _ => Err(OrchestratorError::NoPrecedingHumanTurn),
        })?;
        let Some(request) = request else {
            return Ok(self.log_discarded());
        };

        let response = self.generator.generate(&request).await?;
        let turn = Turn::model(response.content, Termination::from(response.terminating));
        self.commit(epoch, turn);
        Ok(None)
    }

    async fn synthetic_human_turn(&self, epoch: u64) -> Result<Option<Step>, OrchestratorError> {
        let request = self.session.read(|store| {
            (store.epoch() == epoch).then(|| {
                build_request(
                    store.turns(),
                    Speaker::Human,
                    false,
                    store.status().token_budget,
                    &Default::default(),
                )
            })
        });
        let Some(request) = request else {
            return Ok(self.log_discarded());
        };

        let response = self.generator.generate(&request).await?;
        let turn = Turn::synthetic_human(response.content, Termination::from(response.terminating));
        Ok(self
            .commit(epoch, turn.clone())
            .then(|| Step::SyntheticHumanTurn.follow_up(&turn))
            .flatten())
    }

    async fn continue_in_place(
        &self,
        index: usize,
        epoch: u64,
    ) -> Result<Option<Step>, OrchestratorError> {
        let steering = self.session.steering();
        let request = self.session.update(|store| {
            if store.epoch() != epoch {
                return Ok(None);
            }
            let speaker = match store.turns().get(index) {
                Some(turn) if store.continuable_index() == Some(index) && turn.is_extendable() => {
                    turn.speaker()
                }
                _ => return Err(OrchestratorError::NotContinuable { index }),
            };
            store.set_continuation_target(Some(index));
            Ok(Some(build_request(
                store.turns(),
                speaker,
                true,
                store.status().token_budget,
                &steering,
            )))
        })?;
        let Some(request) = request else {
            return Ok(self.log_discarded());
        };

        let response = self.generator.generate(&request).await?;
        let extended = self.session.update(|store| {
            if store.epoch() != epoch || store.status().continuation_target != Some(index) {
                return None;
            }
            store.append_to_turn(index, &response.content, response.termination());
            store.set_continuation_target(None);
            debug_assert_eq!(store.check_invariants(), Ok(()));
            store.turns().get(index).cloned()
        });

        match extended {
            Some(turn) => Ok(Step::Continue { index }.follow_up(&turn)),
            None => Ok(self.log_discarded()),
        }
    }

    /// Append a freshly generated turn unless the log was cleared or popped
    /// since the transaction started.
    fn commit(&self, epoch: u64, turn: Turn) -> bool {
        let committed = self.session.update(|store| {
            if store.epoch() != epoch {
                return false;
            }
            commit_new_turn(store, turn);
            true
        });
        if !committed {
            self.log_discarded();
        }
        committed
    }

    fn log_discarded(&self) -> Option<Step> {
        tracing::info!(session_id = %self.session.id(), "Log changed during generation, discarding result");
        None
    }
}

/// Append `turn`, first sealing an in-progress last turn so it stays the only
/// one that can be non-terminating.
fn commit_new_turn(store: &mut ConversationStore, turn: Turn) {
    if let Some(index) = store.continuable_index() {
        store.append_to_turn(index, "", Termination::Terminating);
    }
    store.append_turn(turn);
    debug_assert_eq!(store.check_invariants(), Ok(()));
}
