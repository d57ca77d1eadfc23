//! Worker results and per-role result sets

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Consumes traffic until a target count is reached
    Subscriber,
    /// Produces a fixed number of messages
    Publisher,
}

impl Role {
    /// Both roles, subscribers first (spawn and join order)
    pub const ALL: [Role; 2] = [Role::Subscriber, Role::Publisher];

    /// Short identifier used in client ids and logs
    pub fn id(self) -> &'static str {
        match self {
            Role::Subscriber => "sub",
            Role::Publisher => "pub",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Subscriber => write!(f, "subscriber"),
            Role::Publisher => write!(f, "publisher"),
        }
    }
}

/// Why a worker did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    /// The worker's own traffic timeout elapsed
    Timeout {
        /// Time since the worker's start event
        elapsed: Duration,
        /// Configured timeout
        budget: Duration,
    },
    /// The protocol client failed
    Client {
        /// Error text
        message: String,
    },
    /// The orchestrator aborted the worker at the join deadline
    Aborted,
    /// The worker task panicked
    Panicked,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout { elapsed, budget } => write!(
                f,
                "timed out after {:.3}s (budget {:.3}s)",
                elapsed.as_secs_f64(),
                budget.as_secs_f64()
            ),
            FailureReason::Client { message } => write!(f, "client error: {}", message),
            FailureReason::Aborted => write!(f, "aborted at join deadline"),
            FailureReason::Panicked => write!(f, "worker panicked"),
        }
    }
}

/// Terminal outcome of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Time between the first traffic event and the target-count event
    Completed(Duration),
    /// The worker stopped without reaching its target
    Failed(FailureReason),
}

impl WorkerOutcome {
    /// Shorthand for a client failure
    pub fn client_failure(err: impl std::fmt::Display) -> Self {
        WorkerOutcome::Failed(FailureReason::Client {
            message: err.to_string(),
        })
    }

    /// Completion duration, if completed
    pub fn duration(&self) -> Option<Duration> {
        match self {
            WorkerOutcome::Completed(d) => Some(*d),
            WorkerOutcome::Failed(_) => None,
        }
    }
}

/// One worker's result as deposited in the result channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Worker index within its role
    pub worker_id: usize,
    /// Worker role
    pub role: Role,
    /// Outcome
    pub outcome: WorkerOutcome,
}

/// Results gathered from all workers of one role
///
/// May hold fewer entries than `requested`; the difference is the number of
/// workers that never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    role: Role,
    requested: usize,
    results: Vec<WorkerResult>,
}

impl ResultSet {
    /// Empty set for a role
    pub fn new(role: Role, requested: usize) -> Self {
        Self {
            role,
            requested,
            results: Vec::with_capacity(requested),
        }
    }

    /// Build a set of completed results from raw durations
    pub fn from_durations(role: Role, requested: usize, durations: &[Duration]) -> Self {
        let mut set = Self::new(role, requested);
        for (worker_id, d) in durations.iter().enumerate() {
            set.push(WorkerResult {
                worker_id,
                role,
                outcome: WorkerOutcome::Completed(*d),
            });
        }
        set
    }

    /// Append a result
    pub fn push(&mut self, result: WorkerResult) {
        self.results.push(result);
    }

    /// Role of this set
    pub fn role(&self) -> Role {
        self.role
    }

    /// Workers requested for the role
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// All results, in arrival order
    pub fn results(&self) -> &[WorkerResult] {
        &self.results
    }

    /// Number of results received
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no result was received
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Completion durations, in arrival order
    pub fn durations(&self) -> Vec<Duration> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.duration())
            .collect()
    }

    /// Number of completed workers
    pub fn completed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, WorkerOutcome::Completed(_)))
            .count()
    }

    /// Results that carry a failure
    pub fn failures(&self) -> impl Iterator<Item = (usize, &FailureReason)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            WorkerOutcome::Failed(reason) => Some((r.worker_id, reason)),
            WorkerOutcome::Completed(_) => None,
        })
    }

    /// Number of failed workers that reported
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Workers that never reported at all
    pub fn missing(&self) -> usize {
        self.requested.saturating_sub(self.results.len())
    }

    /// Requested workers without a completion duration
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.completed())
    }

    /// Whether every requested worker completed
    pub fn is_complete(&self) -> bool {
        self.shortfall() == 0
    }
}
