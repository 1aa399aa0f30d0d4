//! API request and response types

use crate::generation::{BackendHealth, BackendInfo};
use crate::runtime::{SessionSnapshot, SessionSummary};
use crate::steering::SteeringMagnitudes;
use serde::{Deserialize, Serialize};

/// Request to send a typed human turn
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
}

/// Request to extend an in-progress turn
#[derive(Debug, Deserialize)]
pub struct ContinueRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct AutoRunRequest {
    pub enabled: bool,
}

/// Out-of-range values are reported, not rejected, so the UI can keep its
/// slider where it was.
#[derive(Debug, Deserialize)]
pub struct TokenBudgetRequest {
    pub value: i64,
}

/// Replaces the whole steering mapping
#[derive(Debug, Deserialize)]
pub struct SteeringRequest {
    #[serde(default)]
    pub pc_values: SteeringMagnitudes,
}

/// Response with a list of sessions
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Result of any action on a session, with the state it left behind
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub snapshot: SessionSnapshot,
}

impl ActionResponse {
    pub fn ok(snapshot: SessionSnapshot) -> Self {
        Self {
            ok: true,
            error: None,
            snapshot,
        }
    }

    pub fn failed(error: impl Into<String>, snapshot: SessionSnapshot) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            snapshot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenBudgetResponse {
    pub accepted: bool,
    pub snapshot: SessionSnapshot,
}

/// Backend status for the UI's status panel; either half may be missing
#[derive(Debug, Serialize)]
pub struct BackendStatusResponse {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<BackendHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<BackendInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
