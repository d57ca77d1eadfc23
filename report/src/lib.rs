//! Report rendering for pubsub-bench runs
//!
//! Three renderings of a finished run:
//!
//! - [`render_human`]: multi-line report, one banner per role
//! - [`render_brief`]: one colon-delimited line with ten numeric fields
//! - [`render_json`]: structured summary for further processing

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use pubsub_bench_core::{aggregate, BenchmarkRun, ResultSet, Role, RunResults, Stats, StatsError};

/// Summary of one role
#[derive(Debug, Clone)]
pub struct RoleReport {
    /// Role
    pub role: Role,
    /// Workers requested
    pub requested: usize,
    /// Workers that reached their target
    pub completed: usize,
    /// Workers that reported a failure
    pub failed: usize,
    /// Workers that never reported
    pub missing: usize,
    /// Messages per worker
    pub target: u64,
    /// Duration statistics, if any worker completed
    pub stats: Result<Stats, StatsError>,
}

impl RoleReport {
    /// Summarize a role's result set
    pub fn from_results(results: &ResultSet, target: u64) -> Self {
        Self {
            role: results.role(),
            requested: results.requested(),
            completed: results.completed(),
            failed: results.failed(),
            missing: results.missing(),
            target,
            stats: aggregate(results, target, results.requested()),
        }
    }

    /// Workers that did not complete
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.completed)
    }

    fn field(&self, f: impl Fn(&Stats) -> f64) -> f64 {
        self.stats.as_ref().map(f).unwrap_or(f64::NAN)
    }
}

/// Summary of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Broker address as `host:port`
    pub broker: String,
    /// Base topic
    pub topic: String,
    /// QoS level
    pub qos: u8,
    /// Publisher payload size in bytes
    pub payload_size: usize,
    /// Subscriber summary
    pub subscribers: RoleReport,
    /// Publisher summary
    pub publishers: RoleReport,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl RunReport {
    /// Build a report from a run's configuration and results
    pub fn new(run: &BenchmarkRun, results: &RunResults, started_at: DateTime<Utc>) -> Self {
        Self {
            broker: format!("{}:{}", run.broker.host, run.broker.port),
            topic: run.topic.clone(),
            qos: run.qos.level(),
            payload_size: run.payload_size,
            subscribers: RoleReport::from_results(&results.subscribers, run.subscribers.messages),
            publishers: RoleReport::from_results(&results.publishers, run.publishers.messages),
            elapsed: results.elapsed,
            started_at,
        }
    }

    /// Whether every requested worker of both roles completed
    pub fn is_complete(&self) -> bool {
        self.subscribers.shortfall() == 0 && self.publishers.shortfall() == 0
    }

    fn roles(&self) -> [&RoleReport; 2] {
        [&self.subscribers, &self.publishers]
    }
}

/// Heading, duration label and shortfall wording per role
fn labels(role: Role) -> (&'static str, &'static str, &'static str) {
    match role {
        Role::Subscriber => ("Subscription Results", "subscriber", "subscription"),
        Role::Publisher => ("Publisher Results", "publisher", "publishing"),
    }
}

/// Render the multi-line human-readable report
pub fn render_human(report: &RunReport) -> String {
    let mut out = String::new();
    let banner = "=".repeat(80);

    for role in report.roles() {
        let (_, _, noun) = labels(role.role);
        if role.shortfall() > 0 {
            let _ = writeln!(out, "{} {} workers failed", role.shortfall(), noun);
        }
    }

    for role in report.roles() {
        let (heading, label, _) = labels(role.role);
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(out, "{}", heading);
        let _ = writeln!(out, "{}", banner);
        let _ = writeln!(
            out,
            "Completed {} workers: {}/{}",
            label, role.completed, role.requested
        );

        match &role.stats {
            Ok(stats) => {
                let _ = writeln!(out, "Avg. {} duration: {:.6}", label, stats.mean);
                let _ = writeln!(
                    out,
                    "{}{} duration std dev: {:.6}",
                    label[..1].to_uppercase(),
                    &label[1..],
                    stats.std_dev
                );
                let _ = writeln!(out, "Avg. Client Throughput: {:.6}", stats.avg_throughput);
                let _ = writeln!(
                    out,
                    "Total Throughput (msg_count * clients) / (avg. {} time): {:.6}",
                    label, stats.total_throughput
                );
            }
            Err(e) => {
                let _ = writeln!(out, "No data: {}", e);
            }
        }
    }

    let _ = writeln!(out, "{}", banner);
    let _ = writeln!(
        out,
        "Run started {} and took {:.3}s",
        report.started_at.to_rfc3339(),
        report.elapsed.as_secs_f64()
    );
    out
}

/// Render the single-line brief report
///
/// Ten fields, subscribers then publishers, each as
/// `completed:mean:std_dev:avg_throughput:total_throughput`. Values without
/// data print as `NaN`.
pub fn render_brief(report: &RunReport) -> String {
    report
        .roles()
        .iter()
        .map(|role| {
            format!(
                "{}:{:.6}:{:.6}:{:.6}:{:.6}",
                role.completed,
                role.field(|s| s.mean),
                role.field(|s| s.std_dev),
                role.field(|s| s.avg_throughput),
                role.field(|s| s.total_throughput),
            )
        })
        .collect::<Vec<_>>()
        .join(":")
}

fn role_json(role: &RoleReport) -> serde_json::Value {
    let stats = match &role.stats {
        Ok(stats) => json!({
            "samples": stats.samples,
            "mean_secs": finite(stats.mean),
            "std_dev_secs": finite(stats.std_dev),
            "min_secs": finite(stats.min),
            "max_secs": finite(stats.max),
            "avg_throughput": finite(stats.avg_throughput),
            "total_throughput": finite(stats.total_throughput),
            "aggregate_throughput": finite(stats.aggregate_throughput),
        }),
        Err(_) => serde_json::Value::Null,
    };

    json!({
        "requested": role.requested,
        "completed": role.completed,
        "failed": role.failed,
        "missing": role.missing,
        "messages_per_worker": role.target,
        "stats": stats,
    })
}

/// Non-finite values have no JSON representation
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Render the JSON summary
pub fn render_json(report: &RunReport) -> serde_json::Value {
    json!({
        "started_at": report.started_at.to_rfc3339(),
        "elapsed_secs": report.elapsed.as_secs_f64(),
        "broker": report.broker,
        "topic": report.topic,
        "qos": report.qos,
        "payload_size": report.payload_size,
        "complete": report.is_complete(),
        "subscribers": role_json(&report.subscribers),
        "publishers": role_json(&report.publishers),
    })
}
