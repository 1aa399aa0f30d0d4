//! Steering magnitudes
//!
//! A sparse mapping from principal-component index to the offset applied
//! along that component. The values come from the UI sliders; this crate
//! only stores them and decides which ones are worth sending.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Magnitudes at or below this (in absolute value) are treated as "off"
pub const NEAR_ZERO_MAGNITUDE: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteeringMagnitudes(BTreeMap<u32, f64>);

impl SteeringMagnitudes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries the backend should apply: finite and clearly away from zero
    pub fn active(&self) -> BTreeMap<u32, f64> {
        self.0
            .iter()
            .filter(|(_, magnitude)| magnitude.is_finite() && magnitude.abs() > NEAR_ZERO_MAGNITUDE)
            .map(|(index, magnitude)| (*index, *magnitude))
            .collect()
    }
}

impl FromIterator<(u32, f64)> for SteeringMagnitudes {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
