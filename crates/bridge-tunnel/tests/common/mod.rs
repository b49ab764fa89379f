//! Shared helpers for bridge-tunnel integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{
    BridgeEvent, BridgeResult, BridgeSettings, ChatRequest, ChatResponse, EventBus,
    EventSubscription, InMemoryConfigStore, InferencePort, LlmBridgeSettings, TokenCounts,
};
use bridge_tunnel::{
    FrameSender, TransportError, TransportStream, TunnelClient, TunnelPolicy, TunnelTransport,
};
use futures_util::StreamExt;
use futures_util::stream;
use mockall::mock;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

mock! {
    pub Inference {}

    #[async_trait]
    impl InferencePort for Inference {
        async fn chat(&self, request: ChatRequest) -> BridgeResult<ChatResponse>;
        async fn model_names(&self) -> Vec<String>;
    }
}

/// Await `future`, failing the test if it takes longer than `limit`.
pub async fn within<T>(limit: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(limit, future)
        .await
        .expect("operation timed out")
}

pub fn reply(model: &str, content: &str, prompt: u64, completion: u64) -> ChatResponse {
    ChatResponse {
        model: model.to_string(),
        content: content.to_string(),
        tokens: TokenCounts { prompt, completion },
        done_reason: Some("stop".to_string()),
    }
}

/// Wait for the next event matching `predicate`, skipping others.
pub async fn next_event<F>(events: &mut EventSubscription, mut predicate: F) -> BridgeEvent
where
    F: FnMut(&BridgeEvent) -> bool,
{
    within(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event bus closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
}

// ── In-memory transport ────────────────────────────────────────────────

/// Remote end of one in-memory connection.
pub struct Peer {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: Option<mpsc::UnboundedSender<String>>,
    closed: Arc<AtomicBool>,
}

impl Peer {
    /// Next frame the client sent, parsed as JSON.
    pub async fn next_sent(&mut self) -> Value {
        let text = within(Duration::from_secs(5), self.sent.recv())
            .await
            .expect("client side dropped");
        serde_json::from_str(&text).unwrap()
    }

    /// Whether another frame arrives within `wait`.
    pub async fn sent_nothing_within(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.sent.recv()).await.is_err()
    }

    pub fn push(&self, frame: &Value) {
        self.push_text(&frame.to_string());
    }

    pub fn push_text(&self, text: &str) {
        self.inbound
            .as_ref()
            .expect("peer already hung up")
            .send(text.to_string())
            .unwrap();
    }

    /// Close the connection from the remote side.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Whether the client closed its side.
    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ChannelSender {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSender for ChannelSender {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Open,
    Refuse,
    Hang,
}

/// Transport double backed by channels. Every successful connect hands a
/// [`Peer`] to the test.
pub struct ChannelTransport {
    behavior: Behavior,
    peers: mpsc::UnboundedSender<Peer>,
    endpoints: Mutex<Vec<Url>>,
}

impl ChannelTransport {
    pub fn new(behavior: Behavior) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            behavior,
            peers,
            endpoints: Mutex::new(Vec::new()),
        });
        (transport, rx)
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

#[async_trait]
impl TunnelTransport for ChannelTransport {
    async fn connect(&self, endpoint: &Url) -> Result<TransportStream, TransportError> {
        self.endpoints.lock().unwrap().push(endpoint.clone());
        match self.behavior {
            Behavior::Refuse => {
                return Err(TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            Behavior::Hang => std::future::pending::<()>().await,
            Behavior::Open => {}
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let closed = Arc::new(AtomicBool::new(false));

        let incoming = stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|text| (text, rx))
        })
        .boxed();

        let _ = self.peers.send(Peer {
            sent: sent_rx,
            inbound: Some(inbound_tx),
            closed: Arc::clone(&closed),
        });

        Ok(TransportStream {
            sender: Arc::new(ChannelSender {
                tx: sent_tx,
                closed,
            }),
            incoming,
        })
    }
}

// ── Client construction ────────────────────────────────────────────────

pub fn store_with_exposed(models: &[&str]) -> Arc<InMemoryConfigStore> {
    Arc::new(InMemoryConfigStore::new(BridgeSettings {
        llm: LlmBridgeSettings {
            enabled: true,
            bridge_enabled: true,
            exposed_models: models.iter().map(ToString::to_string).collect(),
            ..LlmBridgeSettings::default()
        },
        ..BridgeSettings::default()
    }))
}

pub fn client_with(
    transport: Arc<dyn TunnelTransport>,
    inference: Arc<dyn InferencePort>,
    exposed: &[&str],
    connect_timeout: Duration,
) -> (TunnelClient, EventSubscription) {
    let bus = EventBus::new();
    let events = bus.subscribe();
    let client = TunnelClient::new(
        transport,
        inference,
        store_with_exposed(exposed),
        Arc::new(bus),
        TunnelPolicy { connect_timeout },
    );
    (client, events)
}
