//! Wire types for the generation backend

use crate::conversation::{Speaker, Termination};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role name the backend's chat template understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl From<Speaker> for Role {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::Human => Role::User,
            Speaker::Model => Role::Assistant,
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteeringConfig {
    pub pc_values: BTreeMap<u32, f64>,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub messages: Vec<WireMessage>,
    pub steering_config: SteeringConfig,
    pub num_tokens: u32,
    /// The last message is an in-progress turn to be extended
    pub is_partial: bool,
}

/// Newly generated text only, never the whole turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    pub terminating: bool,
}

impl GenerationResponse {
    pub fn new(content: impl Into<String>, terminating: bool) -> Self {
        Self {
            content: content.into(),
            terminating,
        }
    }

    pub fn termination(&self) -> Termination {
        Termination::from(self.terminating)
    }
}

/// `GET /` on the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub pca_loaded: bool,
}

/// `GET /api/info` on the backend; only `error` is set while the model is
/// still loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steering_layer: Option<u32>,
    #[serde(default)]
    pub num_pca_components: usize,
    #[serde(default)]
    pub variance_explained_first_10: Vec<f64>,
    #[serde(default)]
    pub total_variance_first_10: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
