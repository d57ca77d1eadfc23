//! In-memory protocol client shared by the worker and orchestrator tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::broadcast;

use crate::config::QoS;
use crate::traits::{
    ClientError, ConnectOptions, Connection, InboundMessage, MessageStream, ProtocolClient,
};

/// What a subscription receives
#[derive(Clone)]
pub(crate) enum Delivery {
    /// Everything published through the mock broker
    Live,
    /// A fixed number of messages, then silence (the stream never ends)
    Scripted(usize),
    /// A fixed number of messages, then the stream fails
    ScriptedThenError(usize),
    /// Nothing, ever
    Silent,
}

struct BrokerState {
    tx: broadcast::Sender<InboundMessage>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    publishes: AtomicUsize,
    subscriptions: AtomicUsize,
}

/// Mock protocol client backed by a broadcast channel
#[derive(Clone)]
pub(crate) struct MockClient {
    state: Arc<BrokerState>,
    delivery: Delivery,
    fail_connect: bool,
    publish_delay: Option<Duration>,
    disconnect_delay: Option<Duration>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(4096);
        Self {
            state: Arc::new(BrokerState {
                tx,
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                publishes: AtomicUsize::new(0),
                subscriptions: AtomicUsize::new(0),
            }),
            delivery: Delivery::Live,
            fail_connect: false,
            publish_delay: None,
            disconnect_delay: None,
        }
    }

    pub(crate) fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub(crate) fn with_failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub(crate) fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = Some(delay);
        self
    }

    /// Delay on disconnect, standing in for flushing queued publishes
    pub(crate) fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = Some(delay);
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn publishes(&self) -> usize {
        self.state.publishes.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.state.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, ClientError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ClientError::Connect(format!(
                "{}:{} refused",
                options.host, options.port
            )));
        }
        Ok(Box::new(MockConnection {
            client: self.clone(),
        }))
    }
}

struct MockConnection {
    client: MockClient,
}

fn message(n: usize) -> InboundMessage {
    InboundMessage {
        topic: format!("pybench/{}", n),
        payload: vec![b'x'; 8],
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn subscribe(
        &mut self,
        _topic_filter: &str,
        _qos: QoS,
    ) -> Result<MessageStream, ClientError> {
        let state = &self.client.state;
        state.subscriptions.fetch_add(1, Ordering::SeqCst);

        let stream: MessageStream = match self.client.delivery {
            Delivery::Live => {
                let rx = state.tx.subscribe();
                Box::pin(stream::unfold(rx, |mut rx| async move {
                    loop {
                        match rx.recv().await {
                            Ok(msg) => return Some((Ok(msg), rx)),
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => return None,
                        }
                    }
                }))
            }
            Delivery::Scripted(n) => Box::pin(
                stream::iter((0..n).map(|i| Ok(message(i))))
                    .chain(stream::pending::<Result<InboundMessage, ClientError>>()),
            ),
            Delivery::ScriptedThenError(n) => Box::pin(
                stream::iter((0..n).map(|i| Ok(message(i)))).chain(stream::once(async {
                    Err::<InboundMessage, _>(ClientError::Closed("broker went away".into()))
                })),
            ),
            Delivery::Silent => {
                Box::pin(stream::pending::<Result<InboundMessage, ClientError>>())
            }
        };
        Ok(stream)
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], _qos: QoS) -> Result<(), ClientError> {
        if let Some(delay) = self.client.publish_delay {
            tokio::time::sleep(delay).await;
        }
        let state = &self.client.state;
        state.publishes.fetch_add(1, Ordering::SeqCst);
        let _ = state.tx.send(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(self: Box<Self>) -> Result<(), ClientError> {
        if let Some(delay) = self.client.disconnect_delay {
            tokio::time::sleep(delay).await;
        }
        self.client.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
