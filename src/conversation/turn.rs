//! Turn types

use serde::{Deserialize, Serialize};

/// Who a turn's content is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Human,
    Model,
}

impl Speaker {
    /// The other party
    pub fn flipped(self) -> Self {
        match self {
            Speaker::Human => Speaker::Model,
            Speaker::Model => Speaker::Human,
        }
    }
}

/// Whether a turn ended at a natural stopping point.
///
/// Turns written before the flag existed carry no value at all; those are
/// `Unspecified` and behave exactly like `Terminating`. On the wire this is an
/// optional boolean: `true`, `false`, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Termination {
    Terminating,
    /// Cut short by the token budget; eligible for continuation
    Continuable,
    #[default]
    Unspecified,
}

impl Termination {
    pub fn is_terminating(self) -> bool {
        !matches!(self, Termination::Continuable)
    }
}

impl From<bool> for Termination {
    fn from(terminating: bool) -> Self {
        if terminating {
            Termination::Terminating
        } else {
            Termination::Continuable
        }
    }
}

impl From<Option<bool>> for Termination {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Termination::Unspecified, Termination::from)
    }
}

impl From<Termination> for Option<bool> {
    fn from(value: Termination) -> Self {
        match value {
            Termination::Terminating => Some(true),
            Termination::Continuable => Some(false),
            Termination::Unspecified => None,
        }
    }
}

/// One entry in the conversation.
///
/// `text` only ever grows at the end and `synthetic` is fixed at construction;
/// both are enforced by keeping the fields private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    speaker: Speaker,
    text: String,
    #[serde(default, skip_serializing_if = "is_unspecified")]
    terminating: Termination,
    #[serde(default)]
    synthetic: bool,
}

fn is_unspecified(termination: &Termination) -> bool {
    matches!(termination, Termination::Unspecified)
}

impl Turn {
    /// A turn typed by the human
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Human,
            text: text.into(),
            terminating: Termination::Terminating,
            synthetic: false,
        }
    }

    /// A human turn written by the model impersonating the human
    pub fn synthetic_human(text: impl Into<String>, terminating: Termination) -> Self {
        Self {
            speaker: Speaker::Human,
            text: text.into(),
            terminating,
            synthetic: true,
        }
    }

    pub fn model(text: impl Into<String>, terminating: Termination) -> Self {
        Self {
            speaker: Speaker::Model,
            text: text.into(),
            terminating,
            synthetic: false,
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn termination(&self) -> Termination {
        self.terminating
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.is_terminating()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Model turns and synthetic human turns are the only kinds that can be
    /// produced in pieces.
    pub fn is_extendable(&self) -> bool {
        self.speaker == Speaker::Model || self.synthetic
    }

    pub(super) fn extend(&mut self, text: &str, terminating: Termination) {
        self.text.push_str(text);
        self.terminating = terminating;
    }
}
