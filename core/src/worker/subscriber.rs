//! Subscriber worker
//!
//! `Connecting -> WaitingForFirstMessage -> Counting -> Completed | TimedOut`
//!
//! Deliveries are consumed by a separate task that feeds a
//! [`CompletionLatch`]; the supervising loop wakes on completion or every
//! poll interval to check the traffic timeout. The timeout only starts with
//! the first message, so a subscriber that never sees traffic keeps waiting
//! until the orchestrator's join deadline.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::config::WorkerConfig;
use crate::result::{FailureReason, Role, WorkerOutcome};
use crate::traits::{ConnectOptions, MessageStream, ProtocolClient};

use super::completion::CompletionLatch;

/// Counts deliveries on `<topic>/#` until the target count is reached
pub struct SubscriberWorker {
    id: usize,
    client: Arc<dyn ProtocolClient>,
    config: Arc<WorkerConfig>,
    poll_interval: Duration,
}

impl SubscriberWorker {
    /// Create a new subscriber worker
    pub fn new(
        id: usize,
        client: Arc<dyn ProtocolClient>,
        config: Arc<WorkerConfig>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            client,
            config,
            poll_interval,
        }
    }

    /// Worker index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Topic filter this worker subscribes to
    pub fn topic_filter(&self) -> String {
        format!("{}/#", self.config.topic)
    }

    /// Run until the target count is reached or the traffic timeout elapses
    pub async fn run(self) -> WorkerOutcome {
        let options = ConnectOptions::for_worker(&self.config.broker, Role::Subscriber, self.id);
        let mut conn = match self.client.connect(&options).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(worker_id = self.id, error = %e, "Subscriber failed to connect");
                return WorkerOutcome::client_failure(e);
            }
        };

        let filter = self.topic_filter();
        let stream = match conn.subscribe(&filter, self.config.qos).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(worker_id = self.id, error = %e, "Subscriber failed to subscribe");
                let _ = conn.disconnect().await;
                return WorkerOutcome::client_failure(e);
            }
        };
        tracing::debug!(worker_id = self.id, topic_filter = %filter, "Subscriber waiting for traffic");

        let latch = Arc::new(CompletionLatch::new(self.config.max_count));
        let mut delivery = DeliveryTask(tokio::spawn(deliver(stream, Arc::clone(&latch))));

        let outcome = self.supervise(&latch, &mut delivery).await;
        drop(delivery);

        if let Err(e) = conn.disconnect().await {
            tracing::debug!(worker_id = self.id, error = %e, "Subscriber disconnect failed");
        }

        outcome
    }

    async fn supervise(
        &self,
        latch: &CompletionLatch,
        delivery: &mut DeliveryTask,
    ) -> WorkerOutcome {
        let mut stream_error: Option<String> = None;
        let mut stream_open = true;

        loop {
            tokio::select! {
                _ = latch.wait(self.poll_interval) => {}
                ended = &mut delivery.0, if stream_open => {
                    stream_open = false;
                    stream_error = Some(match ended {
                        Ok(Some(err)) => err,
                        Ok(None) => "message stream ended".to_string(),
                        Err(e) => format!("delivery task failed: {}", e),
                    });
                }
            }

            if let Some(duration) = latch.duration() {
                tracing::debug!(
                    worker_id = self.id,
                    received = latch.received(),
                    elapsed_secs = duration.as_secs_f64(),
                    "Subscriber completed"
                );
                return WorkerOutcome::Completed(duration);
            }

            if let Some(message) = stream_error.take() {
                tracing::warn!(
                    worker_id = self.id,
                    received = latch.received(),
                    error = %message,
                    "Subscriber lost its message stream"
                );
                return WorkerOutcome::Failed(FailureReason::Client { message });
            }

            if let Some(elapsed) = latch.since_start() {
                if elapsed > self.config.timeout {
                    tracing::warn!(
                        worker_id = self.id,
                        received = latch.received(),
                        target = self.config.max_count,
                        "Subscriber hit its timeout"
                    );
                    return WorkerOutcome::Failed(FailureReason::Timeout {
                        elapsed,
                        budget: self.config.timeout,
                    });
                }
            }
        }
    }
}

/// Delivery task handle, aborted on drop so an aborted subscriber does not
/// leave its delivery task running
struct DeliveryTask(tokio::task::JoinHandle<Option<String>>);

impl Drop for DeliveryTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Feed every delivery into the latch until the stream ends
///
/// Returns the stream error, if the stream ended with one.
async fn deliver(mut stream: MessageStream, latch: Arc<CompletionLatch>) -> Option<String> {
    while let Some(item) = stream.next().await {
        match item {
            Ok(_message) => {
                latch.record();
            }
            Err(e) => return Some(e.to_string()),
        }
    }
    None
}

impl std::fmt::Debug for SubscriberWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberWorker")
            .field("id", &self.id)
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
