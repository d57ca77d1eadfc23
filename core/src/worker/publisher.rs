//! Publisher worker

use std::sync::Arc;

use rand::Rng;
use tokio::time::Instant;

use crate::config::{PublishMode, WorkerConfig};
use crate::result::{FailureReason, Role, WorkerOutcome};
use crate::traits::{ClientError, ConnectOptions, Connection, ProtocolClient};

/// Random lowercase ASCII payload of `size` bytes
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}

/// Publishes `max_count` copies of one random payload to `<topic>/<id>`
pub struct PublisherWorker {
    id: usize,
    client: Arc<dyn ProtocolClient>,
    config: Arc<WorkerConfig>,
    mode: PublishMode,
    payload: Vec<u8>,
}

impl PublisherWorker {
    /// Create a new publisher worker; the payload is generated here, once
    pub fn new(
        id: usize,
        client: Arc<dyn ProtocolClient>,
        config: Arc<WorkerConfig>,
        mode: PublishMode,
    ) -> Self {
        let payload = random_payload(config.payload_size);
        Self {
            id,
            client,
            config,
            mode,
            payload,
        }
    }

    /// Worker index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Payload published by this worker
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Topic this worker publishes to
    pub fn topic(&self) -> String {
        format!("{}/{}", self.config.topic, self.id)
    }

    /// Publish the whole batch, checking the timeout after every message
    pub async fn run(self) -> WorkerOutcome {
        let topic = self.topic();
        let options = ConnectOptions::for_worker(&self.config.broker, Role::Publisher, self.id);
        let mut persistent: Option<Box<dyn Connection>> = None;

        let start = Instant::now();
        for sent in 0..self.config.max_count {
            let published = match self.mode {
                PublishMode::PerMessage => self.publish_single(&options, &topic).await,
                PublishMode::Persistent => {
                    if persistent.is_none() {
                        match self.client.connect(&options).await {
                            Ok(conn) => persistent = Some(conn),
                            Err(e) => return self.client_failure(sent, e),
                        }
                    }
                    match persistent.as_mut() {
                        Some(conn) => conn.publish(&topic, &self.payload, self.config.qos).await,
                        None => Err(ClientError::Closed("no connection".into())),
                    }
                }
            };

            if let Err(e) = published {
                if let Some(conn) = persistent.take() {
                    let _ = conn.disconnect().await;
                }
                return self.client_failure(sent, e);
            }

            let elapsed = start.elapsed();
            if elapsed > self.config.timeout {
                tracing::warn!(
                    worker_id = self.id,
                    sent = sent + 1,
                    target = self.config.max_count,
                    "Publisher hit its timeout"
                );
                if let Some(conn) = persistent.take() {
                    let _ = conn.disconnect().await;
                }
                return WorkerOutcome::Failed(FailureReason::Timeout {
                    elapsed,
                    budget: self.config.timeout,
                });
            }
        }
        // Queued publishes are only guaranteed on the wire once the
        // disconnect has flushed them, so it is part of the measurement.
        if let Some(conn) = persistent.take() {
            if let Err(e) = conn.disconnect().await {
                return self.client_failure(self.config.max_count, e);
            }
        }
        let duration = start.elapsed();

        tracing::debug!(
            worker_id = self.id,
            sent = self.config.max_count,
            elapsed_secs = duration.as_secs_f64(),
            "Publisher completed"
        );
        WorkerOutcome::Completed(duration)
    }

    /// One connect-publish-disconnect cycle
    async fn publish_single(&self, options: &ConnectOptions, topic: &str) -> Result<(), ClientError> {
        let mut conn = self.client.connect(options).await?;
        let published = conn.publish(topic, &self.payload, self.config.qos).await;
        let closed = conn.disconnect().await;
        published.and(closed)
    }

    fn client_failure(&self, sent: u64, err: ClientError) -> WorkerOutcome {
        tracing::warn!(worker_id = self.id, sent, error = %err, "Publisher failed");
        WorkerOutcome::client_failure(err)
    }
}

impl std::fmt::Debug for PublisherWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherWorker")
            .field("id", &self.id)
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
