//! Benchmark run configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;
use crate::result::Role;

/// Topic used when none is configured
pub const BASE_TOPIC: &str = "pybench";

/// Default broker port
pub const DEFAULT_PORT: u16 = 1883;

/// Slack added to a role's timeout for its join deadline, covering connect
/// and subscribe
pub const JOIN_GRACE: Duration = Duration::from_secs(30);

/// Message delivery guarantee, passed through to the protocol client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible
    AtLeastOnce,
    /// Four-step handshake delivery
    ExactlyOnce,
}

impl QoS {
    /// Numeric protocol level (0, 1 or 2)
    pub fn level(self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(ConfigError::InvalidQoS(other)),
        }
    }
}

/// TLS settings. Presence enables TLS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    /// CA certificate used to verify the broker
    pub ca_cert: PathBuf,
}

/// Username/password authentication
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password, if any
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Where and how workers reach the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname
    pub host: String,
    /// Broker port
    pub port: u16,
    /// TLS options (None = plain TCP)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    /// Credentials (None = anonymous)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl BrokerConfig {
    /// Plain, anonymous broker on the default port
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            tls: None,
            credentials: None,
        }
    }
}

/// How publishers use connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Connect, publish, disconnect for every message
    #[default]
    PerMessage,
    /// One connection reused for all messages of a worker
    Persistent,
}

/// What the orchestrator does when a role's join deadline elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Abort stragglers, count them as failed, keep going
    #[default]
    Degrade,
    /// Abort the whole run with an orchestrator timeout
    FailFast,
}

/// Per-role sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Number of workers to spawn
    pub workers: usize,
    /// Messages per worker: published (publishers) or awaited (subscribers)
    pub messages: u64,
    /// Per-worker traffic timeout
    pub timeout: Duration,
    /// Shared join deadline for all workers of the role; derived from the
    /// timeout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_budget: Option<Duration>,
}

impl RoleConfig {
    fn new(workers: usize, messages: u64, timeout: Duration) -> Self {
        Self {
            workers,
            messages,
            timeout,
            join_budget: None,
        }
    }
}

/// Immutable configuration handed to one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Broker address, TLS and credentials
    pub broker: BrokerConfig,
    /// Base topic
    pub topic: String,
    /// Target message count
    pub max_count: u64,
    /// Traffic timeout
    pub timeout: Duration,
    /// Delivery guarantee
    pub qos: QoS,
    /// Payload size in bytes (publishers only)
    pub payload_size: usize,
}

/// A complete, validated description of one benchmark run
///
/// Defaults mirror the command-line defaults: ten publishers and ten
/// subscribers exchanging ten 1 KiB messages each, with 60 second timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Broker connection settings
    pub broker: BrokerConfig,
    /// Base topic
    pub topic: String,
    /// Delivery guarantee for every publish and subscription
    pub qos: QoS,
    /// Publisher sizing
    pub publishers: RoleConfig,
    /// Subscriber sizing
    pub subscribers: RoleConfig,
    /// Publisher payload size in bytes
    pub payload_size: usize,
    /// Publisher connection usage
    pub publish_mode: PublishMode,
    /// Subscriber supervision interval
    pub poll_interval: Duration,
    /// Join deadline behavior
    pub join_policy: JoinPolicy,
    /// Result channel sizing
    #[serde(skip)]
    pub channel: ChannelConfig,
}

impl BenchmarkRun {
    /// Create a run against the given broker with default sizing
    pub fn new(broker: BrokerConfig) -> Self {
        let timeout = Duration::from_secs(60);
        Self {
            broker,
            topic: BASE_TOPIC.to_string(),
            qos: QoS::default(),
            publishers: RoleConfig::new(10, 10, timeout),
            subscribers: RoleConfig::new(10, 10, timeout),
            payload_size: 1024,
            publish_mode: PublishMode::default(),
            poll_interval: Duration::from_secs(1),
            join_policy: JoinPolicy::default(),
            channel: ChannelConfig::default(),
        }
    }

    /// Set publisher count and messages per publisher
    pub fn with_publishers(mut self, workers: usize, messages: u64) -> Self {
        self.publishers.workers = workers;
        self.publishers.messages = messages;
        self
    }

    /// Set subscriber count and per-subscriber target count
    pub fn with_subscribers(mut self, workers: usize, messages: u64) -> Self {
        self.subscribers.workers = workers;
        self.subscribers.messages = messages;
        self
    }

    /// Set the traffic timeout of a role
    pub fn with_timeout(mut self, role: Role, timeout: Duration) -> Self {
        self.role_mut(role).timeout = timeout;
        self
    }

    /// Override the join budget of a role
    pub fn with_join_budget(mut self, role: Role, budget: Duration) -> Self {
        self.role_mut(role).join_budget = Some(budget);
        self
    }

    /// Shared join deadline for the workers of a role
    ///
    /// Unless overridden, this is the traffic timeout plus one poll interval
    /// plus [`JOIN_GRACE`]. A worker's timeout clock only starts once it is
    /// connected (subscribers: at the first message) and is checked once per
    /// poll, so the join deadline has to outlast it for a stalled worker to
    /// report its own timeout rather than being aborted.
    pub fn join_budget(&self, role: Role) -> Duration {
        let cfg = self.role(role);
        cfg.join_budget
            .unwrap_or_else(|| cfg.timeout + self.poll_interval + JOIN_GRACE)
    }

    /// Set the base topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the QoS level
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Set the publisher payload size
    pub fn with_payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Set the publisher connection mode
    pub fn with_publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    /// Set the subscriber supervision interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the join policy
    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = policy;
        self
    }

    /// Set the result channel configuration
    pub fn with_channel_config(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Sizing of one role
    pub fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Subscriber => &self.subscribers,
            Role::Publisher => &self.publishers,
        }
    }

    fn role_mut(&mut self, role: Role) -> &mut RoleConfig {
        match role {
            Role::Subscriber => &mut self.subscribers,
            Role::Publisher => &mut self.publishers,
        }
    }

    /// Derive the immutable configuration handed to each worker of a role
    pub fn worker_config(&self, role: Role) -> WorkerConfig {
        let cfg = self.role(role);
        WorkerConfig {
            broker: self.broker.clone(),
            topic: self.topic.clone(),
            max_count: cfg.messages,
            timeout: cfg.timeout,
            qos: self.qos,
            payload_size: match role {
                Role::Publisher => self.payload_size,
                Role::Subscriber => 0,
            },
        }
    }

    /// Validate the configuration
    ///
    /// Rejects runs whose total publish volume can never satisfy a single
    /// subscriber's target, since such subscribers could never complete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publishers.workers == 0 && self.subscribers.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }

        if self.topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        for role in Role::ALL {
            let cfg = self.role(role);
            if cfg.workers > 0 && cfg.messages == 0 {
                return Err(ConfigError::InvalidCount(role));
            }
            if cfg.timeout.is_zero() || cfg.join_budget.is_some_and(|b| b.is_zero()) {
                return Err(ConfigError::InvalidTimeout(role));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.subscribers.workers > 0 {
            let volume = self.publishers.messages.saturating_mul(self.publishers.workers as u64);
            if volume < self.subscribers.messages {
                return Err(ConfigError::InsufficientTraffic {
                    pub_clients: self.publishers.workers,
                    pub_count: self.publishers.messages,
                    sub_count: self.subscribers.messages,
                });
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Publishers cannot produce enough traffic for one subscriber's target
    #[error(
        "not enough traffic: {pub_clients} publishers x {pub_count} messages is less than the \
         subscriber target of {sub_count}"
    )]
    InsufficientTraffic {
        /// Number of publishers
        pub_clients: usize,
        /// Messages per publisher
        pub_count: u64,
        /// Messages each subscriber waits for
        sub_count: u64,
    },

    /// Neither publishers nor subscribers requested
    #[error("at least one publisher or subscriber is required")]
    ZeroWorkers,

    /// A role with workers has a zero message count
    #[error("{0} message count must be at least 1")]
    InvalidCount(Role),

    /// A role has a zero timeout or join budget
    #[error("{0} timeout must be greater than zero")]
    InvalidTimeout(Role),

    /// Zero poll interval
    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    /// Empty hostname
    #[error("broker hostname is required")]
    MissingHost,

    /// Empty topic
    #[error("topic must not be empty")]
    EmptyTopic,

    /// QoS outside 0..=2
    #[error("invalid QoS level {0}, expected 0, 1 or 2")]
    InvalidQoS(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> BenchmarkRun {
        BenchmarkRun::new(BrokerConfig::new("localhost"))
    }

    #[test]
    fn test_default_run() {
        let run = run();
        assert_eq!(run.publishers.workers, 10);
        assert_eq!(run.subscribers.messages, 10);
        assert_eq!(run.broker.port, 1883);
        assert_eq!(run.topic, "pybench");
        assert_eq!(run.payload_size, 1024);
        assert_eq!(run.qos, QoS::AtMostOnce);
        assert_eq!(run.join_budget(Role::Publisher), Duration::from_secs(91));
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_insufficient_traffic_rejected() {
        let run = run().with_publishers(1, 5).with_subscribers(3, 10);
        assert_eq!(
            run.validate(),
            Err(ConfigError::InsufficientTraffic {
                pub_clients: 1,
                pub_count: 5,
                sub_count: 10
            })
        );
    }

    #[test]
    fn test_exact_traffic_accepted() {
        let run = run().with_publishers(2, 5).with_subscribers(3, 10);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_traffic_check_skipped_without_subscribers() {
        let run = run().with_publishers(1, 1).with_subscribers(0, 100);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let run = run().with_publishers(0, 10).with_subscribers(0, 10);
        assert_eq!(run.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let run = run().with_timeout(Role::Publisher, Duration::ZERO);
        assert_eq!(
            run.validate(),
            Err(ConfigError::InvalidTimeout(Role::Publisher))
        );
    }

    #[test]
    fn test_join_budget_outlasts_timeout() {
        let run = run()
            .with_timeout(Role::Subscriber, Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(500))
            .with_join_budget(Role::Publisher, Duration::from_secs(7));

        // timeout + poll interval + grace
        assert_eq!(
            run.join_budget(Role::Subscriber),
            Duration::from_millis(35_500)
        );
        assert_eq!(run.join_budget(Role::Publisher), Duration::from_secs(7));
    }

    #[test]
    fn test_zero_join_budget_rejected() {
        let run = run().with_join_budget(Role::Subscriber, Duration::ZERO);
        assert_eq!(
            run.validate(),
            Err(ConfigError::InvalidTimeout(Role::Subscriber))
        );
    }

    #[test]
    fn test_worker_config_per_role() {
        let run = run().with_payload_size(64).with_publishers(2, 7);
        let publisher = run.worker_config(Role::Publisher);
        let subscriber = run.worker_config(Role::Subscriber);

        assert_eq!(publisher.max_count, 7);
        assert_eq!(publisher.payload_size, 64);
        assert_eq!(subscriber.payload_size, 0);
        assert_eq!(subscriber.max_count, 10);
    }

    #[test]
    fn test_qos_from_level() {
        assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
        assert_eq!(QoS::try_from(3), Err(ConfigError::InvalidQoS(3)));
        assert_eq!(QoS::AtLeastOnce.level(), 1);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "bench".into(),
            password: Some("secret".into()),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("bench"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_run_serialization_skips_password() {
        let mut broker = BrokerConfig::new("localhost");
        broker.credentials = Some(Credentials {
            username: "bench".into(),
            password: Some("secret".into()),
        });
        let json = serde_json::to_string(&BenchmarkRun::new(broker)).unwrap();
        assert!(json.contains("\"username\":\"bench\""));
        assert!(!json.contains("secret"));
    }
}
