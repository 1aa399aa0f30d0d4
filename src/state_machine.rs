//! Turn-taking state machine
//!
//! Pure decision over the turn log plus the transcript shapes each decision
//! sends to the backend. No I/O lives here.

mod decision;
pub mod transcript;

#[cfg(test)]
mod proptests;

pub use decision::{decide, Step};
