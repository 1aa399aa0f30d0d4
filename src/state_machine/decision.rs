//! Next-action decision
//!
//! Pure function of the turn log. Only the last turn is ever consulted, so a
//! stray non-terminating turn earlier in the log can never be acted on.

use crate::conversation::{Speaker, Turn};
use serde::Serialize;
use std::fmt;

/// One generation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Model writes the next human turn
    SyntheticHumanTurn,
    /// Model answers the preceding human turn
    ModelReply,
    /// Extend the in-progress turn at `index`
    Continue { index: usize },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SyntheticHumanTurn => write!(f, "synthetic_human_turn"),
            Step::ModelReply => write!(f, "model_reply"),
            Step::Continue { index } => write!(f, "continue({index})"),
        }
    }
}

/// Pick the next action for the log
pub fn decide(turns: &[Turn]) -> Step {
    let Some(last) = turns.last() else {
        return Step::SyntheticHumanTurn;
    };
    let index = turns.len() - 1;

    match (last.speaker(), last.is_terminating(), last.is_synthetic()) {
        // A typed human turn is never continued, whatever its flag says
        (Speaker::Human, false, true) | (Speaker::Model, false, _) => Step::Continue { index },
        (Speaker::Human, _, _) => Step::ModelReply,
        (Speaker::Model, true, _) => Step::SyntheticHumanTurn,
    }
}

impl Step {
    /// Step that runs in the same transaction after this one wrote `turn`.
    ///
    /// A finished synthetic human turn always gets its model reply straight
    /// away; nothing else chains.
    pub fn follow_up(self, turn: &Turn) -> Option<Step> {
        match self {
            Step::SyntheticHumanTurn | Step::Continue { .. }
                if turn.is_synthetic() && turn.is_terminating() =>
            {
                Some(Step::ModelReply)
            }
            _ => None,
        }
    }
}
