//! Conversation state store
//!
//! Owns the turn log and the status flags. Every mutation is a plain
//! `&mut self` method; the session wrapper serializes access and publishes
//! each change, so no mutation is ever observed half-applied.

use super::turn::{Speaker, Termination, Turn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_TOKEN_BUDGET: u32 = 1;
pub const MAX_TOKEN_BUDGET: u32 = 500;
pub const DEFAULT_TOKEN_BUDGET: u32 = 100;

/// Number of generation units requested per call, always within 1..=500
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenBudget(u32);

impl TokenBudget {
    /// Returns `None` when `value` is outside the accepted range
    pub fn new(value: i64) -> Option<Self> {
        u32::try_from(value)
            .ok()
            .filter(|v| (MIN_TOKEN_BUDGET..=MAX_TOKEN_BUDGET).contains(v))
            .map(Self)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self(DEFAULT_TOKEN_BUDGET)
    }
}

/// Session-wide status flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationStatus {
    /// A generation request is outstanding
    pub generating: bool,
    /// Turn being extended by the outstanding continuation request
    pub continuation_target: Option<usize>,
    pub auto_run: bool,
    pub last_error: Option<String>,
    pub token_budget: TokenBudget,
}

/// Broken structural invariant of the turn log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("turn {index} is non-terminating but is not the last turn")]
    NonTerminatingNotLast { index: usize },
    #[error("turn {index} is synthetic but not human-authored")]
    SyntheticModelTurn { index: usize },
    #[error("continuation target {target} is not the last turn")]
    StaleContinuationTarget { target: usize },
}

/// The log as it stood when a transaction began
#[derive(Debug, Clone)]
pub struct Checkpoint {
    turns: Vec<Turn>,
    epoch: u64,
}

impl Checkpoint {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    status: ConversationStatus,
    /// Bumped whenever turns are removed, so in-flight results can tell that
    /// the log they were generated for is gone.
    epoch: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn status(&self) -> &ConversationStatus {
        &self.status
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Adds to the end; callers keep the "only the last turn may be
    /// non-terminating" invariant.
    pub fn append_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            turns: self.turns.clone(),
            epoch: self.epoch,
        }
    }

    /// Put the log back to `checkpoint`, undoing appended turns, extensions
    /// and sealing alike. A log cleared or popped since is left as the user
    /// made it. Returns whether anything was restored.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> bool {
        if checkpoint.epoch != self.epoch {
            return false;
        }
        self.turns = checkpoint.turns;
        self.status.continuation_target = None;
        true
    }

    /// Empties the log. Auto-run and the token budget are left alone.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.status.continuation_target = None;
        self.epoch += 1;
    }

    pub fn pop_last_turn(&mut self) -> Option<Turn> {
        let popped = self.turns.pop();
        self.status.continuation_target = None;
        self.epoch += 1;
        popped
    }

    /// Concatenates onto an existing model or synthetic human turn and
    /// overwrites its termination. Returns `false` (and changes nothing) when
    /// the index is out of bounds or the turn cannot be extended.
    pub fn append_to_turn(&mut self, index: usize, text: &str, terminating: Termination) -> bool {
        match self.turns.get_mut(index) {
            Some(turn) if turn.is_extendable() => {
                turn.extend(text, terminating);
                true
            }
            _ => false,
        }
    }

    pub fn set_generating(&mut self, generating: bool) {
        self.status.generating = generating;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.status.last_error = error;
    }

    /// Out-of-range values are ignored; returns whether the value was taken
    pub fn set_token_budget(&mut self, value: i64) -> bool {
        match TokenBudget::new(value) {
            Some(budget) => {
                self.status.token_budget = budget;
                true
            }
            None => false,
        }
    }

    pub fn set_continuation_target(&mut self, target: Option<usize>) {
        self.status.continuation_target = target;
    }

    pub fn set_auto_run(&mut self, auto_run: bool) {
        self.status.auto_run = auto_run;
    }

    /// Index of the turn a continuation may extend, if any
    pub fn continuable_index(&self) -> Option<usize> {
        let index = self.turns.len().checked_sub(1)?;
        (self.turns[index].termination() == Termination::Continuable).then_some(index)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let last = self.turns.len().saturating_sub(1);
        for (index, turn) in self.turns.iter().enumerate() {
            if !turn.is_terminating() && index != last {
                return Err(InvariantViolation::NonTerminatingNotLast { index });
            }
            if turn.is_synthetic() && turn.speaker() != Speaker::Human {
                return Err(InvariantViolation::SyntheticModelTurn { index });
            }
        }
        match self.status.continuation_target {
            Some(target) if self.turns.is_empty() || target != last => {
                Err(InvariantViolation::StaleContinuationTarget { target })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_turn_concatenates_and_overwrites_flag() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::model("Hi", Termination::Continuable));

        assert!(store.append_to_turn(0, " there", Termination::Terminating));

        let turn = &store.turns()[0];
        assert_eq!(turn.text(), "Hi there");
        assert_eq!(turn.termination(), Termination::Terminating);
    }

    #[test]
    fn test_append_to_turn_rejects_typed_human_and_out_of_bounds() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::human("Hello"));

        assert!(!store.append_to_turn(0, " world", Termination::Continuable));
        assert!(!store.append_to_turn(7, "x", Termination::Terminating));
        assert_eq!(store.turns()[0].text(), "Hello");
        assert!(store.turns()[0].is_terminating());
    }

    #[test]
    fn test_appended_turn_reads_back_identically() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::model("Why did", Termination::Continuable));

        let turn = store.last_turn().unwrap();
        assert_eq!(turn.text(), "Why did");
        assert_eq!(turn.termination(), Termination::Continuable);
    }

    #[test]
    fn test_rollback_restores_sealed_and_appended_turns() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::human("Hi"));
        store.append_turn(Turn::model("One,", Termination::Continuable));
        let checkpoint = store.checkpoint();

        store.append_to_turn(1, "", Termination::Terminating);
        store.append_turn(Turn::human("Stop"));

        assert!(store.rollback(checkpoint));
        assert_eq!(store.turns().len(), 2);
        assert_eq!(store.turns()[1].termination(), Termination::Continuable);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_rollback_after_clear_keeps_cleared_log() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::human("Hi"));
        let checkpoint = store.checkpoint();

        store.clear();

        assert!(!store.rollback(checkpoint));
        assert!(store.turns().is_empty());
    }

    #[test]
    fn test_token_budget_range() {
        let mut store = ConversationStore::new();
        for rejected in [0, -5, 501] {
            assert!(!store.set_token_budget(rejected));
            assert_eq!(store.status().token_budget.get(), DEFAULT_TOKEN_BUDGET);
        }

        assert!(store.set_token_budget(1));
        assert_eq!(store.status().token_budget.get(), 1);
        assert!(store.set_token_budget(500));
        assert_eq!(store.status().token_budget.get(), 500);
    }

    #[test]
    fn test_clear_keeps_auto_run_and_budget() {
        let mut store = ConversationStore::new();
        store.set_auto_run(true);
        store.set_token_budget(42);
        store.append_turn(Turn::model("partial", Termination::Continuable));
        store.set_continuation_target(Some(0));

        store.clear();

        assert!(store.turns().is_empty());
        assert_eq!(store.status().continuation_target, None);
        assert!(store.status().auto_run);
        assert_eq!(store.status().token_budget.get(), 42);
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn test_pop_last_turn_clears_target() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::human("Hi"));
        store.append_turn(Turn::model("Hel", Termination::Continuable));
        store.set_continuation_target(Some(1));

        let popped = store.pop_last_turn().unwrap();

        assert_eq!(popped.text(), "Hel");
        assert_eq!(store.turns().len(), 1);
        assert_eq!(store.status().continuation_target, None);
    }

    #[test]
    fn test_continuable_index_only_considers_last_turn() {
        let mut store = ConversationStore::new();
        assert_eq!(store.continuable_index(), None);

        store.append_turn(Turn::human("Tell me a joke"));
        assert_eq!(store.continuable_index(), None);

        store.append_turn(Turn::model("Why did", Termination::Continuable));
        assert_eq!(store.continuable_index(), Some(1));

        store.append_turn(Turn::model("legacy", Termination::Unspecified));
        assert_eq!(store.continuable_index(), None);
    }

    #[test]
    fn test_check_invariants_flags_buried_partial_turn() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::model("cut", Termination::Continuable));
        store.append_turn(Turn::human("next"));

        assert_eq!(
            store.check_invariants(),
            Err(InvariantViolation::NonTerminatingNotLast { index: 0 })
        );
    }

    #[test]
    fn test_check_invariants_flags_stale_target() {
        let mut store = ConversationStore::new();
        store.append_turn(Turn::human("Hi"));
        store.set_continuation_target(Some(3));

        assert_eq!(
            store.check_invariants(),
            Err(InvariantViolation::StaleContinuationTarget { target: 3 })
        );
    }
}
