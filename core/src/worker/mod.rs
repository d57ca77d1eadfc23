//! Worker module for driving broker traffic
//!
//! A worker is a single tokio task that drives a bounded amount of protocol
//! traffic and ends with exactly one [`WorkerOutcome`](crate::WorkerOutcome).
//! There are two variants:
//!
//! - [`SubscriberWorker`]: subscribes, counts deliveries until a target
//!   count is reached, and reports the time between the first and the
//!   target-count message.
//! - [`PublisherWorker`]: publishes a fixed number of copies of a random
//!   payload and reports the time the whole batch took.
//!
//! Both give up with a `Timeout` failure once their traffic timeout elapses.
//!
//! # Example
//!
//! ```ignore
//! use pubsub_bench_core::worker::WorkerBuilder;
//!
//! let worker = WorkerBuilder::new(0, Role::Publisher)
//!     .client(client)
//!     .config(run.worker_config(Role::Publisher))
//!     .build()?;
//!
//! worker.run_and_post(sink.slot(0)).await;
//! ```

mod builder;
mod completion;
mod executor;
mod publisher;
mod subscriber;

pub use builder::WorkerBuilder;
pub use completion::CompletionLatch;
pub use executor::Worker;
pub use publisher::{random_payload, PublisherWorker};
pub use subscriber::SubscriberWorker;
