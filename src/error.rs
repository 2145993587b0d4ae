//! Domain error types.
//!
//! Most anomalies in this simulator (collisions, receive failures, queue
//! overflow) are modeled as counters, not errors — nothing in the hot
//! simulation loop returns `Result`. The only things that can fail are
//! wire-time concerns: reading/parsing configuration and writing results.

use std::fmt;

#[derive(Debug)]
pub enum SimError {
    /// Missing keys or nonsensical values in a loaded configuration.
    Config(String),
    /// A result file could not be written.
    Report(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            SimError::Report(msg) => write!(f, "failed to write result: {msg}"),
        }
    }
}

impl std::error::Error for SimError {}
