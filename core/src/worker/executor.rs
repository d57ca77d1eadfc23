//! Role-agnostic worker handle

use crate::channel::ResultSlot;
use crate::result::{Role, WorkerOutcome};

use super::publisher::PublisherWorker;
use super::subscriber::SubscriberWorker;

/// A publisher or subscriber, ready to run
#[derive(Debug)]
pub enum Worker {
    /// Subscriber variant
    Subscriber(SubscriberWorker),
    /// Publisher variant
    Publisher(PublisherWorker),
}

impl Worker {
    /// Worker index within its role
    pub fn id(&self) -> usize {
        match self {
            Worker::Subscriber(w) => w.id(),
            Worker::Publisher(w) => w.id(),
        }
    }

    /// Worker role
    pub fn role(&self) -> Role {
        match self {
            Worker::Subscriber(_) => Role::Subscriber,
            Worker::Publisher(_) => Role::Publisher,
        }
    }

    /// Run to completion or failure
    pub async fn run(self) -> WorkerOutcome {
        match self {
            Worker::Subscriber(w) => w.run().await,
            Worker::Publisher(w) => w.run().await,
        }
    }

    /// Run and deposit the outcome through the worker's slot
    ///
    /// Both `self` and `slot` are consumed, so each worker posts at most once.
    pub async fn run_and_post(self, slot: ResultSlot) {
        let id = self.id();
        let role = self.role();
        tracing::debug!(worker_id = id, role = %role, "Worker started");

        let outcome = self.run().await;
        if let WorkerOutcome::Failed(reason) = &outcome {
            tracing::warn!(worker_id = id, role = %role, reason = %reason, "Worker failed");
        }
        slot.post(outcome);
    }
}
