//! Orchestrator for benchmark run lifecycle management
//!
//! The Orchestrator coordinates one benchmark run:
//! - Spawning subscriber workers, then publisher workers
//! - Joining each role against a single shared deadline
//! - Draining every role's result channel
//! - Reporting shortfalls (workers without a completion duration)
//!
//! # Example
//!
//! ```ignore
//! use pubsub_bench_core::{aggregate, OrchestratorBuilder, Role};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .run(run)
//!     .client(client)
//!     .build()?;
//!
//! let results = orchestrator.run().await?;
//! let stats = aggregate(&results.subscribers, 10, 10);
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate, Stats, StatsError};
pub use builder::OrchestratorBuilder;
pub use executor::{Orchestrator, RunResults};

#[cfg(test)]
mod tests;
