//! Protocol client boundary
//!
//! Workers only talk to the broker through these traits. Implementations
//! live in the `pubsub-bench-clients` crate; tests use in-memory mocks.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::config::{BrokerConfig, Credentials, QoS, TlsOptions};
use crate::result::Role;

/// Inbound message stream returned by [`Connection::subscribe`]
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, ClientError>> + Send>>;

/// A message delivered to a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published to
    pub topic: String,
    /// Message body
    pub payload: Vec<u8>,
}

/// Everything needed to open one broker connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Broker hostname
    pub host: String,
    /// Broker port
    pub port: u16,
    /// TLS settings (None = plain TCP)
    pub tls: Option<TlsOptions>,
    /// Credentials (None = anonymous)
    pub credentials: Option<Credentials>,
    /// Client identifier presented to the broker
    pub client_id: String,
}

impl ConnectOptions {
    /// Options for a worker connection, with a process-unique client id
    pub fn for_worker(broker: &BrokerConfig, role: Role, worker_id: usize) -> Self {
        Self {
            host: broker.host.clone(),
            port: broker.port,
            tls: broker.tls.clone(),
            credentials: broker.credentials.clone(),
            client_id: format!(
                "pubsub-bench-{}-{}-{}",
                std::process::id(),
                role.id(),
                worker_id
            ),
        }
    }
}

/// Capability to open broker connections
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Protocol identifier (e.g., "mqtt")
    fn name(&self) -> &str;

    /// Open a connection, completing once the broker accepted it
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, ClientError>;
}

/// An open broker connection
#[async_trait]
pub trait Connection: Send {
    /// Subscribe to a topic filter and return the inbound message stream
    ///
    /// Completes once the broker acknowledged the subscription. The stream
    /// yields once per delivered message until the connection closes.
    async fn subscribe(&mut self, topic_filter: &str, qos: QoS) -> Result<MessageStream, ClientError>;

    /// Publish one message
    ///
    /// For QoS above 0 this completes once the broker acknowledged delivery.
    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), ClientError>;

    /// Close the connection cleanly
    async fn disconnect(self: Box<Self>) -> Result<(), ClientError>;
}

/// Protocol client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection refused or handshake failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Broker rejected or did not acknowledge a subscription
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Publish could not be sent or acknowledged
    #[error("publish failed: {0}")]
    Publish(String),

    /// TLS setup failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection closed underneath us
    #[error("connection closed: {0}")]
    Closed(String),

    /// IO error (e.g., reading the CA certificate)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
