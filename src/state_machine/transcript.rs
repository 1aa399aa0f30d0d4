//! Transcript construction for generation requests
//!
//! The backend always writes as the assistant. To have it speak for the
//! human, every speaker is flipped so the human sits in the assistant seat.

use crate::conversation::{Speaker, TokenBudget, Turn};
use crate::generation::{GenerationRequest, Role, SteeringConfig, WireMessage};
use crate::steering::SteeringMagnitudes;

/// Transcript as-is: human → user, model → assistant
pub fn direct(turns: &[Turn]) -> Vec<WireMessage> {
    turns
        .iter()
        .map(|turn| WireMessage::new(Role::from(turn.speaker()), turn.text()))
        .collect()
}

/// Transcript with every speaker flipped.
///
/// Always starts with a user message: when the flipped log would open with
/// the assistant (or is empty) an empty user message is put in front.
pub fn role_swapped(turns: &[Turn]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    let opens_with_user = turns
        .first()
        .is_some_and(|turn| Role::from(turn.speaker().flipped()) == Role::User);
    if !opens_with_user {
        messages.push(WireMessage::new(Role::User, ""));
    }
    messages.extend(
        turns
            .iter()
            .map(|turn| WireMessage::new(Role::from(turn.speaker().flipped()), turn.text())),
    );
    messages
}

/// Build the request that makes the backend speak as `speaker`.
///
/// Steering only applies to model-authored text; requests for the human side
/// go out with an empty mapping.
pub fn build_request(
    turns: &[Turn],
    speaker: Speaker,
    is_partial: bool,
    token_budget: TokenBudget,
    steering: &SteeringMagnitudes,
) -> GenerationRequest {
    let (messages, pc_values) = match speaker {
        Speaker::Model => (direct(turns), steering.active()),
        Speaker::Human => (role_swapped(turns), Default::default()),
    };

    GenerationRequest {
        messages,
        steering_config: SteeringConfig { pc_values },
        num_tokens: token_budget.get(),
        is_partial,
    }
}
