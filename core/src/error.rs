//! Error types for pubsub-bench-core

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::result::Role;

/// Core error type
///
/// Only conditions that abort a whole run surface as `BenchError`. A single
/// worker failing is reported through its `WorkerOutcome` instead.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid run configuration, raised before any worker is spawned
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The shared join deadline of a role elapsed with workers still running
    #[error("timed out waiting for {role} workers after {budget:?} ({pending} still running)")]
    OrchestratorTimeout {
        /// Role whose workers were being joined
        role: Role,
        /// Join budget that elapsed
        budget: Duration,
        /// Number of workers that had not finished
        pending: usize,
    },

    /// Missing builder input
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
}

impl BenchError {
    /// Whether this error is the orchestrator-level join timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, BenchError::OrchestratorTimeout { .. })
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
