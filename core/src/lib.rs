//! pubsub-bench-core: Core engine for benchmarking publish/subscribe brokers
//!
//! This crate provides the foundational types used across all pubsub-bench
//! components, including:
//!
//! - Run configuration and validation
//! - Core traits (ProtocolClient, Connection)
//! - Subscriber and publisher workers
//! - The orchestrator and duration statistics
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod result;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod testing;

pub use channel::{result_channel, ChannelConfig, ResultDrain, ResultSink, ResultSlot};
pub use config::*;
pub use error::*;
pub use orchestrator::{aggregate, Orchestrator, OrchestratorBuilder, RunResults, Stats, StatsError};
pub use result::*;
pub use traits::*;
pub use worker::{CompletionLatch, Worker, WorkerBuilder};

#[cfg(test)]
mod integration_tests {
    use super::*;

    // =========================================================================
    // Serialized formats
    // =========================================================================

    #[test]
    fn test_role_lowercase_serialization() {
        assert_eq!(
            serde_json::to_string(&Role::Subscriber).unwrap(),
            "\"subscriber\""
        );
        assert_eq!(
            serde_json::to_string(&Role::Publisher).unwrap(),
            "\"publisher\""
        );
    }

    #[test]
    fn test_failure_reason_is_tagged() {
        let json = serde_json::to_string(&FailureReason::Aborted).unwrap();
        assert!(json.contains("\"kind\""));
    }

    #[test]
    fn test_stats_json_field_names() {
        let set = ResultSet::from_durations(
            Role::Publisher,
            1,
            &[std::time::Duration::from_secs(1)],
        );
        let stats = aggregate(&set, 10, 1).unwrap();
        let json = serde_json::to_string(&stats).unwrap();

        for field in ["mean", "std_dev", "min", "max", "avg_throughput", "total_throughput"] {
            assert!(json.contains(field), "missing {}", field);
        }
    }
}
