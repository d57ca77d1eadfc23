//! MQTT client built on rumqttc
//!
//! Every [`Connection`] owns one rumqttc event loop, driven by a background
//! task. The task completes the connect handshake, forwards inbound
//! publishes to the subscription stream, and reports acknowledgements back
//! to the connection so QoS 1 and 2 publishes can wait for them.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet,
    SubscribeReasonCode, TlsConfiguration, Transport,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use pubsub_bench_core::{
    ClientError, ConnectOptions, Connection, InboundMessage, MessageStream, ProtocolClient, QoS,
};

/// Default time allowed for the broker to accept a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for a subscribe or publish acknowledgement
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 16;
const INBOUND_CAPACITY: usize = 1024;
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Map a benchmark QoS onto the rumqttc one
pub fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// MQTT 3.1.1 protocol client
#[derive(Debug, Clone)]
pub struct MqttClient {
    connect_timeout: Duration,
    ack_timeout: Duration,
}

impl Default for MqttClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttClient {
    /// Create a client with default timeouts
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Set the connect handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the acknowledgement timeout
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    async fn mqtt_options(&self, options: &ConnectOptions) -> Result<MqttOptions, ClientError> {
        let mut mqtt = MqttOptions::new(&options.client_id, &options.host, options.port);
        mqtt.set_keep_alive(KEEP_ALIVE);
        mqtt.set_clean_session(true);

        if let Some(credentials) = &options.credentials {
            mqtt.set_credentials(
                &credentials.username,
                credentials.password.as_deref().unwrap_or_default(),
            );
        }

        if let Some(tls) = &options.tls {
            let ca = tokio::fs::read(&tls.ca_cert).await?;
            if ca.is_empty() {
                return Err(ClientError::Tls(format!(
                    "CA certificate {} is empty",
                    tls.ca_cert.display()
                )));
            }
            mqtt.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: None,
            }));
        }

        Ok(mqtt)
    }
}

#[async_trait]
impl ProtocolClient for MqttClient {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, ClientError> {
        let mqtt = self.mqtt_options(options).await?;
        let (client, eventloop) = AsyncClient::new(mqtt, REQUEST_CAPACITY);

        let (connected_tx, connected_rx) = oneshot::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::channel(REQUEST_CAPACITY);
        let driver = Driver(tokio::spawn(drive(
            eventloop,
            connected_tx,
            inbound_tx,
            ack_tx,
        )));

        match tokio::time::timeout(self.connect_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => {
                return Err(ClientError::Connect(
                    "event loop stopped before the broker answered".to_string(),
                ))
            }
            Err(_) => {
                return Err(ClientError::Connect(format!(
                    "{}:{} did not accept the connection within {:.1}s",
                    options.host,
                    options.port,
                    self.connect_timeout.as_secs_f64()
                )))
            }
        }

        tracing::debug!(
            client_id = %options.client_id,
            host = %options.host,
            port = options.port,
            tls = options.tls.is_some(),
            "MQTT connection established"
        );

        Ok(Box::new(MqttConnection {
            client,
            driver,
            inbound: Some(inbound_rx),
            acks: ack_rx,
            ack_timeout: self.ack_timeout,
        }))
    }
}

/// Acknowledgements reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ack {
    Subscribe { granted: bool },
    Publish,
}

/// Event loop task handle, aborted on drop
struct Driver(JoinHandle<()>);

impl Drop for Driver {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct MqttConnection {
    client: AsyncClient,
    driver: Driver,
    inbound: Option<mpsc::Receiver<Result<InboundMessage, ClientError>>>,
    acks: mpsc::Receiver<Ack>,
    ack_timeout: Duration,
}

impl MqttConnection {
    /// Wait for the next acknowledgement matching `wanted`
    async fn next_ack(&mut self, wanted: fn(&Ack) -> bool) -> Result<Ack, String> {
        let deadline = tokio::time::Instant::now() + self.ack_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.acks.recv()).await {
                Ok(Some(ack)) if wanted(&ack) => return Ok(ack),
                Ok(Some(_)) => continue,
                Ok(None) => return Err("connection closed before acknowledgement".to_string()),
                Err(_) => {
                    return Err(format!(
                        "no acknowledgement within {:.1}s",
                        self.ack_timeout.as_secs_f64()
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl Connection for MqttConnection {
    async fn subscribe(&mut self, topic_filter: &str, qos: QoS) -> Result<MessageStream, ClientError> {
        let inbound = self.inbound.take().ok_or_else(|| {
            ClientError::Subscribe("connection already has a subscription".to_string())
        })?;

        self.client
            .subscribe(topic_filter, to_mqtt_qos(qos))
            .await
            .map_err(|e| ClientError::Subscribe(e.to_string()))?;

        match self
            .next_ack(|ack| matches!(ack, Ack::Subscribe { .. }))
            .await
            .map_err(ClientError::Subscribe)?
        {
            Ack::Subscribe { granted: true } => {}
            _ => {
                return Err(ClientError::Subscribe(format!(
                    "broker rejected subscription to {}",
                    topic_filter
                )))
            }
        }

        Ok(Box::pin(stream::unfold(inbound, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), ClientError> {
        self.client
            .publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .await
            .map_err(|e| ClientError::Publish(e.to_string()))?;

        if qos != QoS::AtMostOnce {
            self.next_ack(|ack| *ack == Ack::Publish)
                .await
                .map_err(ClientError::Publish)?;
        }
        Ok(())
    }

    async fn disconnect(mut self: Box<Self>) -> Result<(), ClientError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ClientError::Closed(e.to_string()))?;

        // The driver exits once the DISCONNECT is written, which also flushes
        // any QoS 0 publishes queued before it.
        if tokio::time::timeout(DISCONNECT_GRACE, &mut self.driver.0)
            .await
            .is_err()
        {
            tracing::debug!("MQTT event loop did not stop in time, aborting");
        }
        Ok(())
    }
}

/// Poll the event loop until the connection ends
async fn drive(
    mut eventloop: EventLoop,
    connected: oneshot::Sender<Result<(), ClientError>>,
    inbound: mpsc::Sender<Result<InboundMessage, ClientError>>,
    acks: mpsc::Sender<Ack>,
) {
    let mut connected = Some(connected);

    loop {
        let event = match eventloop.poll().await {
            Ok(event) => event,
            Err(e) => {
                match connected.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(ClientError::Connect(e.to_string())));
                    }
                    None => {
                        tracing::debug!(error = %e, "MQTT connection lost");
                        let _ = inbound.try_send(Err(ClientError::Closed(e.to_string())));
                    }
                }
                return;
            }
        };

        match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                let accepted = connack.code == ConnectReturnCode::Success;
                if let Some(tx) = connected.take() {
                    let result = if accepted {
                        Ok(())
                    } else {
                        Err(ClientError::Connect(format!(
                            "broker refused connection: {:?}",
                            connack.code
                        )))
                    };
                    let _ = tx.send(result);
                }
                if !accepted {
                    return;
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                // the subscription stream may already be gone
                let _ = inbound.send(Ok(message)).await;
            }
            Event::Incoming(Packet::SubAck(suback)) => {
                let granted = suback
                    .return_codes
                    .iter()
                    .all(|code| !matches!(code, SubscribeReasonCode::Failure));
                let _ = acks.try_send(Ack::Subscribe { granted });
            }
            Event::Incoming(Packet::PubAck(_)) | Event::Incoming(Packet::PubComp(_)) => {
                let _ = acks.try_send(Ack::Publish);
            }
            Event::Outgoing(Outgoing::Disconnect) => return,
            _ => {}
        }
    }
}
