//! Duration statistics and throughput per role

use serde::{Deserialize, Serialize};

use crate::result::{ResultSet, Role};

/// Statistics over the completion durations of one role
///
/// All durations are in seconds, throughputs in messages per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of durations the statistics were computed over
    pub samples: usize,

    /// Mean completion duration
    pub mean: f64,

    /// Population standard deviation of the durations
    pub std_dev: f64,

    /// Shortest duration
    pub min: f64,

    /// Longest duration
    pub max: f64,

    /// Single-worker throughput: `target / mean`
    pub avg_throughput: f64,

    /// Requested-capacity throughput: `target * requested workers / mean`
    pub total_throughput: f64,

    /// Sum-based throughput: `target * requested workers / sum(durations)`
    pub aggregate_throughput: f64,
}

/// Aggregation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    /// No worker of the role reported a duration
    #[error("no {role} durations were collected")]
    EmptySample {
        /// Role without data
        role: Role,
    },
}

/// Aggregate the completed durations of a result set
///
/// Only completed workers contribute samples. `worker_count` is the number of
/// workers requested, not the number that reported: total throughput states
/// the demand the requested fleet would generate at the observed mean pace.
///
/// # Errors
/// Returns [`StatsError::EmptySample`] when no duration was collected.
pub fn aggregate(
    results: &ResultSet,
    target_count_per_worker: u64,
    worker_count: usize,
) -> Result<Stats, StatsError> {
    let durations: Vec<f64> = results
        .durations()
        .iter()
        .map(|d| d.as_secs_f64())
        .collect();

    if durations.is_empty() {
        return Err(StatsError::EmptySample {
            role: results.role(),
        });
    }

    let n = durations.len() as f64;
    let sum: f64 = durations.iter().sum();
    let mean = sum / n;
    let variance = durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let target = target_count_per_worker as f64;
    let requested = target * worker_count as f64;

    Ok(Stats {
        samples: durations.len(),
        mean,
        std_dev: variance.sqrt(),
        min,
        max,
        avg_throughput: target / mean,
        total_throughput: requested / mean,
        aggregate_throughput: requested / sum,
    })
}
