//! CLI argument parsing and run dispatch

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use pubsub_bench_clients::MqttClient;
use pubsub_bench_core::{
    BenchmarkRun, BrokerConfig, Credentials, JoinPolicy, OrchestratorBuilder, PublishMode, QoS,
    Role, TlsOptions, BASE_TOPIC, DEFAULT_PORT,
};
use pubsub_bench_report::{render_brief, render_human, render_json, RunReport};

#[derive(Parser, Debug)]
#[command(name = "pubsub-bench")]
#[command(author, version, about = "Load generator for MQTT brokers", long_about = None)]
pub struct Cli {
    /// Number of publisher workers
    #[arg(long, default_value_t = 10)]
    pub pub_clients: usize,

    /// Number of subscriber workers
    #[arg(long, default_value_t = 10)]
    pub sub_clients: usize,

    /// Messages sent by each publisher
    #[arg(long, default_value_t = 10)]
    pub pub_count: u64,

    /// Messages each subscriber waits for
    #[arg(long, default_value_t = 10)]
    pub sub_count: u64,

    /// Payload size in bytes
    #[arg(long, default_value_t = 1024)]
    pub msg_size: usize,

    /// Subscriber timeout in seconds, counted from the first message
    #[arg(long, default_value_t = 60)]
    pub sub_timeout: u64,

    /// Publisher timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub pub_timeout: u64,

    /// Broker hostname
    #[arg(long)]
    pub hostname: String,

    /// Broker port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base topic
    #[arg(long, default_value = BASE_TOPIC)]
    pub topic: String,

    /// CA certificate; enables TLS
    #[arg(long)]
    pub cacert: Option<PathBuf>,

    /// Username for broker authentication
    #[arg(long)]
    pub username: Option<String>,

    /// Password for broker authentication
    #[arg(long, env = "PUBSUB_BENCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// QoS level for every publish and subscription
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: u8,

    /// Print one colon-delimited line instead of the full report
    #[arg(long, conflicts_with = "json")]
    pub brief: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep one connection per publisher instead of one per message
    #[arg(long)]
    pub reuse_connection: bool,

    /// Join deadline in seconds for each role; defaults to the role's
    /// timeout plus the poll interval and a connect grace period
    #[arg(long)]
    pub join_timeout: Option<u64>,

    /// Fail the run instead of aborting workers still running at the join deadline
    #[arg(long)]
    pub fail_on_join_timeout: bool,

    /// Subscriber supervision interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every requested worker completed
    Complete,
    /// At least one worker of either role did not complete
    Shortfall,
}

impl Cli {
    /// Translate the flags into a validated run configuration
    pub fn into_run(&self) -> Result<BenchmarkRun> {
        let mut broker = BrokerConfig::new(&self.hostname);
        broker.port = self.port;
        broker.tls = self.cacert.clone().map(|ca_cert| TlsOptions { ca_cert });
        broker.credentials = match (&self.username, &self.password) {
            (Some(username), password) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, Some(_)) => {
                tracing::warn!("Password given without a username, connecting anonymously");
                None
            }
            (None, None) => None,
        };

        let qos = QoS::try_from(self.qos)?;
        let publish_mode = if self.reuse_connection {
            PublishMode::Persistent
        } else {
            PublishMode::PerMessage
        };
        let join_policy = if self.fail_on_join_timeout {
            JoinPolicy::FailFast
        } else {
            JoinPolicy::Degrade
        };

        let mut run = BenchmarkRun::new(broker)
            .with_topic(&self.topic)
            .with_qos(qos)
            .with_publishers(self.pub_clients, self.pub_count)
            .with_subscribers(self.sub_clients, self.sub_count)
            .with_timeout(Role::Publisher, Duration::from_secs(self.pub_timeout))
            .with_timeout(Role::Subscriber, Duration::from_secs(self.sub_timeout))
            .with_payload_size(self.msg_size)
            .with_publish_mode(publish_mode)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_join_policy(join_policy);
        if let Some(secs) = self.join_timeout {
            for role in Role::ALL {
                run = run.with_join_budget(role, Duration::from_secs(secs));
            }
        }

        run.validate().context("Invalid benchmark configuration")?;
        Ok(run)
    }

    /// Run the benchmark and print the report to stdout
    pub async fn execute(&self) -> Result<RunStatus> {
        let run = self.into_run()?;

        if let Some(tls) = &run.broker.tls {
            if !tls.ca_cert.is_file() {
                bail!("CA certificate {} not found", tls.ca_cert.display());
            }
        }

        let started_at = chrono::Utc::now();
        let orchestrator = OrchestratorBuilder::new()
            .run(run)
            .client(Arc::new(MqttClient::new()))
            .build()
            .context("Failed to set up benchmark")?;

        let results = orchestrator.run().await.context("Benchmark run failed")?;
        let report = RunReport::new(orchestrator.config(), &results, started_at);

        if self.brief {
            println!("{}", render_brief(&report));
        } else if self.json {
            let json = serde_json::to_string_pretty(&render_json(&report))
                .context("Failed to serialize report")?;
            println!("{}", json);
        } else {
            print!("{}", render_human(&report));
        }

        Ok(if report.is_complete() {
            RunStatus::Complete
        } else {
            RunStatus::Shortfall
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_bench_core::ConfigError;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pubsub-bench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--hostname", "broker.local"]);

        assert_eq!(cli.pub_clients, 10);
        assert_eq!(cli.sub_clients, 10);
        assert_eq!(cli.msg_size, 1024);
        assert_eq!(cli.port, 1883);
        assert_eq!(cli.topic, "pybench");
        assert_eq!(cli.qos, 0);
        assert!(!cli.brief);
    }

    #[test]
    fn test_hostname_required() {
        assert!(Cli::try_parse_from(["pubsub-bench"]).is_err());
    }

    #[test]
    fn test_qos_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["pubsub-bench", "--hostname", "h", "--qos", "3"]).is_err());
    }

    #[test]
    fn test_brief_conflicts_with_json() {
        let result =
            Cli::try_parse_from(["pubsub-bench", "--hostname", "h", "--brief", "--json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_run_maps_flags() {
        let cli = parse(&[
            "--hostname",
            "broker.local",
            "--port",
            "8883",
            "--cacert",
            "/etc/ca.pem",
            "--username",
            "bench",
            "--password",
            "secret",
            "--qos",
            "1",
            "--reuse-connection",
            "--fail-on-join-timeout",
            "--sub-timeout",
            "5",
        ]);

        let run = cli.into_run().unwrap();

        assert_eq!(run.broker.port, 8883);
        assert!(run.broker.tls.is_some());
        assert_eq!(
            run.broker.credentials.as_ref().map(|c| c.username.as_str()),
            Some("bench")
        );
        assert_eq!(run.qos, QoS::AtLeastOnce);
        assert_eq!(run.publish_mode, PublishMode::Persistent);
        assert_eq!(run.join_policy, JoinPolicy::FailFast);
        assert_eq!(run.subscribers.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_join_timeout_defaults_past_role_timeout() {
        let run = parse(&["--hostname", "h", "--sub-timeout", "5"])
            .into_run()
            .unwrap();
        assert!(run.join_budget(Role::Subscriber) > Duration::from_secs(6));

        let run = parse(&["--hostname", "h", "--join-timeout", "90"])
            .into_run()
            .unwrap();
        assert_eq!(run.join_budget(Role::Subscriber), Duration::from_secs(90));
        assert_eq!(run.join_budget(Role::Publisher), Duration::from_secs(90));
    }

    #[test]
    fn test_into_run_rejects_insufficient_traffic() {
        let cli = parse(&[
            "--hostname",
            "h",
            "--pub-clients",
            "1",
            "--pub-count",
            "5",
            "--sub-count",
            "10",
        ]);

        let err = cli.into_run().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InsufficientTraffic { .. })
        ));
        assert_eq!(crate::exit_code(&err), 1);
    }
}
