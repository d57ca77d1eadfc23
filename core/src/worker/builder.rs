//! Builder pattern for Worker construction

use std::sync::Arc;
use std::time::Duration;

use crate::config::{PublishMode, WorkerConfig};
use crate::error::{BenchError, BenchResult};
use crate::result::Role;
use crate::traits::ProtocolClient;

use super::executor::Worker;
use super::publisher::PublisherWorker;
use super::subscriber::SubscriberWorker;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0, Role::Subscriber)
///     .client(client)
///     .config(config)
///     .poll_interval(Duration::from_secs(1))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    role: Role,
    client: Option<Arc<dyn ProtocolClient>>,
    config: Option<Arc<WorkerConfig>>,
    poll_interval: Duration,
    publish_mode: PublishMode,
}

impl WorkerBuilder {
    /// Create a new builder for the given worker index and role
    pub fn new(id: usize, role: Role) -> Self {
        Self {
            id,
            role,
            client: None,
            config: None,
            poll_interval: Duration::from_secs(1),
            publish_mode: PublishMode::default(),
        }
    }

    /// Set the protocol client
    pub fn client(mut self, client: Arc<dyn ProtocolClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the worker configuration
    pub fn config(mut self, config: impl Into<Arc<WorkerConfig>>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Set the subscriber supervision interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the publisher connection mode
    pub fn publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if the client or the configuration is missing.
    pub fn build(self) -> BenchResult<Worker> {
        let client = self.client.ok_or(BenchError::MissingConfig("client"))?;
        let config = self.config.ok_or(BenchError::MissingConfig("config"))?;

        Ok(match self.role {
            Role::Subscriber => Worker::Subscriber(SubscriberWorker::new(
                self.id,
                client,
                config,
                self.poll_interval,
            )),
            Role::Publisher => Worker::Publisher(PublisherWorker::new(
                self.id,
                client,
                config,
                self.publish_mode,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_missing_client() {
        let result = WorkerBuilder::new(0, Role::Publisher).build();

        assert!(matches!(result, Err(BenchError::MissingConfig("client"))));
    }
}
