//! Result channel between workers and the orchestrator
//!
//! Each role gets its own bounded mpsc channel. Workers never see the
//! sender directly: they receive a [`ResultSlot`], which is consumed by
//! [`ResultSlot::post`], so a worker can deposit at most one result.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::result::{Role, WorkerOutcome, WorkerResult};

/// Channel buffer configuration for orchestrator communication
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Result channel buffer size (workers -> orchestrator)
    pub result_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            result_buffer: 1024,
        }
    }
}

impl ChannelConfig {
    /// Create a new channel config with custom result buffer size
    pub fn with_result_buffer(mut self, size: usize) -> Self {
        self.result_buffer = size;
        self
    }

    /// Buffer size able to hold one result per worker without blocking
    pub(crate) fn capacity_for(&self, workers: usize) -> usize {
        self.result_buffer.max(workers).max(1)
    }
}

/// Create the result channel for one role
pub fn result_channel(role: Role, capacity: usize) -> (ResultSink, ResultDrain) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResultSink { role, tx }, ResultDrain { role, rx })
}

/// Producer side, held by the orchestrator while spawning workers
#[derive(Debug)]
pub struct ResultSink {
    role: Role,
    tx: mpsc::Sender<WorkerResult>,
}

impl ResultSink {
    /// Hand out the single-use slot for one worker
    pub fn slot(&self, worker_id: usize) -> ResultSlot {
        ResultSlot {
            worker_id,
            role: self.role,
            tx: self.tx.clone(),
        }
    }
}

/// Single-use handle through which one worker posts its result
#[derive(Debug)]
pub struct ResultSlot {
    worker_id: usize,
    role: Role,
    tx: mpsc::Sender<WorkerResult>,
}

impl ResultSlot {
    /// Worker this slot belongs to
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Deposit the worker's result, consuming the slot
    ///
    /// Never waits: the orchestrator sizes the channel to hold one result per
    /// worker. Returns `false` if the drain side is gone.
    pub fn post(self, outcome: WorkerOutcome) -> bool {
        let result = WorkerResult {
            worker_id: self.worker_id,
            role: self.role,
            outcome,
        };
        match self.tx.try_send(result) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    worker_id = self.worker_id,
                    role = %self.role,
                    error = %e,
                    "Failed to post worker result"
                );
                false
            }
        }
    }
}

/// Consumer side, owned by the orchestrator
#[derive(Debug)]
pub struct ResultDrain {
    role: Role,
    rx: mpsc::Receiver<WorkerResult>,
}

impl ResultDrain {
    /// Role of this channel
    pub fn role(&self) -> Role {
        self.role
    }

    /// Receive up to `expected` results, waiting at most `timeout` per result
    ///
    /// Stops early when the timeout elapses or every producer is gone, so the
    /// returned vector may be shorter than `expected`.
    pub async fn drain(&mut self, expected: usize, timeout: Duration) -> Vec<WorkerResult> {
        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!(
                        role = %self.role,
                        received = results.len(),
                        expected,
                        "Result drain timed out"
                    );
                    break;
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_default() {
        let config = ChannelConfig::default();
        assert_eq!(config.result_buffer, 1024);
    }

    #[test]
    fn test_channel_config_builder() {
        let config = ChannelConfig::default().with_result_buffer(8);
        assert_eq!(config.result_buffer, 8);
        assert_eq!(config.capacity_for(20), 20);
        assert_eq!(config.capacity_for(2), 8);
    }

    #[tokio::test]
    async fn test_slots_post_once_each() {
        let (sink, mut drain) = result_channel(Role::Publisher, 4);
        let slots: Vec<_> = (0..3).map(|id| sink.slot(id)).collect();
        drop(sink);

        for slot in slots {
            assert!(slot.post(WorkerOutcome::Completed(Duration::from_millis(10))));
        }

        let results = drain.drain(5, Duration::from_secs(1)).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.role == Role::Publisher));
    }

    #[tokio::test]
    async fn test_drain_stops_when_producers_gone() {
        let (sink, mut drain) = result_channel(Role::Subscriber, 4);
        let slot = sink.slot(0);
        drop(slot);
        drop(sink);

        let results = drain.drain(2, Duration::from_secs(60)).await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_bounded_by_timeout() {
        let (sink, mut drain) = result_channel(Role::Subscriber, 4);
        sink.slot(0)
            .post(WorkerOutcome::Completed(Duration::from_secs(1)));

        // sink still alive: the second recv can only end by timeout
        let results = drain.drain(2, Duration::from_secs(5)).await;
        assert_eq!(results.len(), 1);
        drop(sink);
    }

    #[tokio::test]
    async fn test_post_after_drain_dropped() {
        let (sink, drain) = result_channel(Role::Subscriber, 1);
        drop(drain);
        assert!(!sink.slot(0).post(WorkerOutcome::client_failure("gone")));
    }
}
