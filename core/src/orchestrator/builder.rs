//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::BenchmarkRun;
use crate::error::{BenchError, BenchResult};
use crate::traits::ProtocolClient;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with a validated run
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .run(BenchmarkRun::new(BrokerConfig::new("localhost")))
///     .client(Arc::new(MqttClient::new()))
///     .build()?;
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    run: Option<BenchmarkRun>,
    client: Option<Arc<dyn ProtocolClient>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run configuration
    pub fn run(mut self, run: BenchmarkRun) -> Self {
        self.run = Some(run);
        self
    }

    /// Set the protocol client shared by all workers
    pub fn client(mut self, client: Arc<dyn ProtocolClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the run or client is not set, or if the run fails
    /// validation.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let run = self.run.ok_or(BenchError::MissingConfig("run"))?;
        let client = self.client.ok_or(BenchError::MissingConfig("client"))?;

        run.validate()?;

        Ok(Orchestrator::new(run, client))
    }
}
