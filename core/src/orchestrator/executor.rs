//! Orchestrator execution logic

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::channel::{result_channel, ResultDrain};
use crate::config::{BenchmarkRun, JoinPolicy};
use crate::error::{BenchError, BenchResult};
use crate::result::{FailureReason, ResultSet, Role, WorkerOutcome, WorkerResult};
use crate::traits::ProtocolClient;
use crate::worker::WorkerBuilder;

/// Results of one run, per role
#[derive(Debug, Clone)]
pub struct RunResults {
    /// Subscriber results
    pub subscribers: ResultSet,
    /// Publisher results
    pub publishers: ResultSet,
    /// Wall-clock time from the first spawn to the last drain
    pub elapsed: Duration,
}

impl RunResults {
    /// Result set of one role
    pub fn role(&self, role: Role) -> &ResultSet {
        match role {
            Role::Subscriber => &self.subscribers,
            Role::Publisher => &self.publishers,
        }
    }

    /// Whether every requested worker of both roles completed
    pub fn is_complete(&self) -> bool {
        self.subscribers.is_complete() && self.publishers.is_complete()
    }
}

/// Worker tasks of one role, spawned but not yet joined
struct RoleTasks {
    role: Role,
    requested: usize,
    budget: Duration,
    /// Each task yields its worker id and whether it ran without panicking
    tasks: JoinSet<(usize, bool)>,
    drain: ResultDrain,
}

/// Orchestrator manages the run lifecycle
///
/// Responsible for spawning workers, enforcing the join deadlines, and
/// collecting results.
pub struct Orchestrator {
    /// Validated run configuration
    pub(crate) run: BenchmarkRun,

    /// Protocol client (shared across workers)
    pub(crate) client: Arc<dyn ProtocolClient>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder`, which validates the run first.
    pub(crate) fn new(run: BenchmarkRun, client: Arc<dyn ProtocolClient>) -> Self {
        Self { run, client }
    }

    /// Get the run configuration
    pub fn config(&self) -> &BenchmarkRun {
        &self.run
    }

    /// Run the benchmark
    ///
    /// Spawns all subscribers, then all publishers, joins each role against
    /// its own shared deadline, and drains the results.
    ///
    /// # Errors
    ///
    /// Fails with [`BenchError::OrchestratorTimeout`] when a deadline elapses
    /// under [`JoinPolicy::FailFast`]; any still-running workers are aborted.
    pub async fn run(&self) -> BenchResult<RunResults> {
        let start = Instant::now();

        tracing::info!(
            client = self.client.name(),
            host = %self.run.broker.host,
            port = self.run.broker.port,
            subscribers = self.run.subscribers.workers,
            publishers = self.run.publishers.workers,
            qos = self.run.qos.level(),
            "Starting benchmark run"
        );

        // Subscribers first so their subscriptions are likely in place
        // before publishers start producing traffic.
        let mut subscribers = self.spawn_role(Role::Subscriber)?;
        let mut publishers = self.spawn_role(Role::Publisher)?;

        let sub_unreported = self.join_role(&mut subscribers).await?;
        let pub_unreported = self.join_role(&mut publishers).await?;

        let subscribers = collect(subscribers, sub_unreported).await;
        let publishers = collect(publishers, pub_unreported).await;

        let elapsed = start.elapsed();
        tracing::info!(
            elapsed_secs = elapsed.as_secs_f64(),
            subscribers_completed = subscribers.completed(),
            publishers_completed = publishers.completed(),
            "Benchmark run finished"
        );

        Ok(RunResults {
            subscribers,
            publishers,
            elapsed,
        })
    }

    fn spawn_role(&self, role: Role) -> BenchResult<RoleTasks> {
        let cfg = self.run.role(role);
        let (sink, drain) = result_channel(role, self.run.channel.capacity_for(cfg.workers));
        let config = Arc::new(self.run.worker_config(role));
        let mut tasks = JoinSet::new();

        for worker_id in 0..cfg.workers {
            let worker = WorkerBuilder::new(worker_id, role)
                .client(Arc::clone(&self.client))
                .config(Arc::clone(&config))
                .poll_interval(self.run.poll_interval)
                .publish_mode(self.run.publish_mode)
                .build()?;
            let slot = sink.slot(worker_id);

            tasks.spawn(async move {
                let ran = AssertUnwindSafe(worker.run_and_post(slot))
                    .catch_unwind()
                    .await;
                (worker_id, ran.is_ok())
            });
        }

        tracing::debug!(role = %role, workers = cfg.workers, "Spawned workers");

        Ok(RoleTasks {
            role,
            requested: cfg.workers,
            budget: self.run.join_budget(role),
            tasks,
            drain,
        })
    }

    /// Wait for every task of a role against one deadline
    ///
    /// Returns synthesized failures for workers that could not post a result
    /// themselves: those that panicked and those aborted at the deadline.
    async fn join_role(&self, role_tasks: &mut RoleTasks) -> BenchResult<Vec<WorkerResult>> {
        let role = role_tasks.role;
        let deadline = Instant::now() + role_tasks.budget;
        let mut returned: HashMap<usize, bool> = HashMap::with_capacity(role_tasks.requested);

        loop {
            match tokio::time::timeout_at(deadline, role_tasks.tasks.join_next()).await {
                Ok(None) => break,
                Ok(Some(Ok((worker_id, ran)))) => {
                    if !ran {
                        tracing::error!(worker_id, role = %role, "Worker task panicked");
                    }
                    returned.insert(worker_id, ran);
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(role = %role, error = %e, "Worker task failed to join");
                }
                Err(_) => {
                    let pending = role_tasks.tasks.len();
                    role_tasks.tasks.abort_all();

                    if self.run.join_policy == JoinPolicy::FailFast {
                        tracing::error!(
                            role = %role,
                            pending,
                            budget_secs = role_tasks.budget.as_secs_f64(),
                            "Timed out waiting for workers"
                        );
                        return Err(BenchError::OrchestratorTimeout {
                            role,
                            budget: role_tasks.budget,
                            pending,
                        });
                    }

                    tracing::warn!(
                        role = %role,
                        pending,
                        budget_secs = role_tasks.budget.as_secs_f64(),
                        "Join deadline elapsed, aborting remaining workers"
                    );
                    while let Some(joined) = role_tasks.tasks.join_next().await {
                        if let Ok((worker_id, ran)) = joined {
                            returned.insert(worker_id, ran);
                        }
                    }
                    break;
                }
            }
        }

        Ok((0..role_tasks.requested)
            .filter_map(|worker_id| {
                let reason = match returned.get(&worker_id) {
                    Some(true) => return None,
                    Some(false) => FailureReason::Panicked,
                    None => FailureReason::Aborted,
                };
                Some(WorkerResult {
                    worker_id,
                    role,
                    outcome: WorkerOutcome::Failed(reason),
                })
            })
            .collect())
    }
}

/// Drain a joined role's channel into its result set
async fn collect(mut role_tasks: RoleTasks, unreported: Vec<WorkerResult>) -> ResultSet {
    let role = role_tasks.role;
    let mut set = ResultSet::new(role, role_tasks.requested);

    let posted = role_tasks
        .drain
        .drain(role_tasks.requested, role_tasks.budget)
        .await;
    for result in posted.into_iter().chain(unreported) {
        set.push(result);
    }

    let shortfall = set.shortfall();
    if shortfall > 0 {
        tracing::warn!(
            role = %role,
            shortfall,
            failed = set.failed(),
            missing = set.missing(),
            "{} {} workers failed",
            shortfall,
            role
        );
    }

    set
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("run", &self.run)
            .field("client", &self.client.name())
            .finish()
    }
}
