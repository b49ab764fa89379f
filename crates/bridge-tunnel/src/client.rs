//! Tunnel client.
//!
//! One live connection at most. [`TunnelClient::connect`] replaces any prior
//! connection, registers the exposed models and spawns a reader task that
//! answers `llm_request` frames concurrently. Responses are correlated only
//! by `requestId`, so they may leave in a different order than requests
//! arrived.
//!
//! The connection is not re-established when the remote side closes it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bridge_core::{
    BridgeError, BridgeEvent, BridgeResult, ConfigStore, EventEmitter, EventSource,
    InferencePort, TokenCounts, TunnelStatus,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::endpoint::tunnel_endpoint;
use crate::frame::{LlmRequest, LlmResponse, TunnelFrame};
use crate::transport::{FrameSender, TransportStream, TunnelTransport};

#[derive(Debug, Clone)]
pub struct TunnelPolicy {
    /// The transport must be open within this long.
    pub connect_timeout: Duration,
}

impl Default for TunnelPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Client side of the inference tunnel.
pub struct TunnelClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn TunnelTransport>,
    inference: Arc<dyn InferencePort>,
    config: Arc<dyn ConfigStore>,
    emitter: Arc<dyn EventEmitter>,
    policy: TunnelPolicy,
    status: watch::Sender<TunnelStatus>,
    connection: Mutex<Option<Connection>>,
    /// Bumped by every connect and disconnect; readers of older
    /// generations leave shared state alone.
    generation: AtomicU64,
    connect_lock: tokio::sync::Mutex<()>,
}

struct Connection {
    generation: u64,
    sender: Arc<dyn FrameSender>,
    reader: JoinHandle<()>,
}

type InFlight = Arc<Mutex<HashSet<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TunnelClient {
    pub fn new(
        transport: Arc<dyn TunnelTransport>,
        inference: Arc<dyn InferencePort>,
        config: Arc<dyn ConfigStore>,
        emitter: Arc<dyn EventEmitter>,
        policy: TunnelPolicy,
    ) -> Self {
        let (status, _) = watch::channel(TunnelStatus::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                inference,
                config,
                emitter,
                policy,
                status,
                connection: Mutex::new(None),
                generation: AtomicU64::new(0),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn status(&self) -> TunnelStatus {
        *self.inner.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<TunnelStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == TunnelStatus::Connected
    }

    /// Open the tunnel to `remote_url` authenticated with `token`.
    ///
    /// Any existing connection is closed first. On success the status is
    /// `connected` and a `register` frame has been sent with the exposed
    /// models: the configured allow-list, or the runtime's whole inventory
    /// when the list is empty.
    pub async fn connect(&self, remote_url: &str, token: &str) -> BridgeResult<()> {
        let _connecting = self.inner.connect_lock.lock().await;
        let endpoint = tunnel_endpoint(remote_url, token)?;

        self.inner.teardown().await;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.set_status(TunnelStatus::Connecting);
        info!(remote_url, "Connecting tunnel");

        let opened = timeout(
            self.inner.policy.connect_timeout,
            self.inner.transport.connect(&endpoint),
        )
        .await;
        let TransportStream { sender, incoming } = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.inner.fail(generation, e.into())),
            Err(_) => {
                let message = format!(
                    "Tunnel did not open within {}s",
                    self.inner.policy.connect_timeout.as_secs_f32()
                );
                return Err(self.inner.fail(generation, BridgeError::Communication(message)));
            }
        };

        let models = self.inner.exposed_models().await;
        let register = TunnelFrame::Register {
            models: models.clone(),
        };
        let registered = match register.encode() {
            Ok(text) => sender.send(text).await.map_err(BridgeError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = registered {
            close_quietly(sender.as_ref()).await;
            return Err(self.inner.fail(generation, e));
        }

        let installed = {
            let mut slot = lock(&self.inner.connection);
            let current = self.inner.generation.load(Ordering::SeqCst) == generation;
            if current {
                let reader = tokio::spawn(Arc::clone(&self.inner).read_loop(
                    generation,
                    Arc::clone(&sender),
                    incoming,
                ));
                *slot = Some(Connection {
                    generation,
                    sender: Arc::clone(&sender),
                    reader,
                });
                self.inner.set_status(TunnelStatus::Connected);
            }
            current
        };
        if !installed {
            close_quietly(sender.as_ref()).await;
            return Err(BridgeError::Communication(
                "Tunnel connect was cancelled".to_string(),
            ));
        }
        info!(models = ?models, "Tunnel connected");
        Ok(())
    }

    /// Close the tunnel, if any, and report `disconnected`.
    pub async fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.teardown().await;
        self.inner.set_status(TunnelStatus::Disconnected);
    }
}

impl Drop for TunnelClient {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = lock(&self.inner.connection).take() {
            connection.reader.abort();
        }
    }
}

impl Inner {
    fn set_status(&self, status: TunnelStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            self.emitter.emit(BridgeEvent::TunnelStatusChanged { status });
        }
    }

    /// Record a failed connect attempt and hand the error back.
    fn fail(&self, generation: u64, error: BridgeError) -> BridgeError {
        warn!(error = %error, "Tunnel connect failed");
        if self.generation.load(Ordering::SeqCst) == generation {
            self.set_status(TunnelStatus::Error);
        }
        error
    }

    async fn exposed_models(&self) -> Vec<String> {
        let configured = match self.config.llm_settings().await {
            Ok(settings) => settings.exposed_models,
            Err(e) => {
                warn!(error = %e, "Could not read exposed models, exposing full inventory");
                Vec::new()
            }
        };
        let configured: Vec<String> = configured
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if configured.is_empty() {
            self.inference.model_names().await
        } else {
            configured
        }
    }

    async fn teardown(&self) {
        let previous = lock(&self.connection).take();
        if let Some(connection) = previous {
            connection.reader.abort();
            close_quietly(connection.sender.as_ref()).await;
            debug!(generation = connection.generation, "Closed tunnel connection");
        }
    }

    async fn read_loop(
        self: Arc<Self>,
        generation: u64,
        sender: Arc<dyn FrameSender>,
        mut incoming: BoxStream<'static, String>,
    ) {
        let in_flight = InFlight::default();
        while let Some(text) = incoming.next().await {
            match TunnelFrame::decode(&text) {
                Ok(TunnelFrame::LlmRequest(request)) => {
                    self.dispatch(request, &sender, &in_flight);
                }
                Ok(other) => debug!(frame = ?other, "Ignoring tunnel frame"),
                Err(e) => {
                    let answerable = TunnelFrame::undecodable_request(&text)
                        .filter(|(request_id, _)| !lock(&in_flight).contains(request_id));
                    if let Some((request_id, model)) = answerable {
                        self.reject(request_id, model, &e, sender.as_ref()).await;
                    } else {
                        warn!(error = %e, "Dropping tunnel frame");
                        self.emitter
                            .emit(BridgeEvent::error(EventSource::Tunnel, e.to_string()));
                    }
                }
            }
        }
        self.on_closed(generation);
    }

    fn dispatch(
        self: &Arc<Self>,
        request: LlmRequest,
        sender: &Arc<dyn FrameSender>,
        in_flight: &InFlight,
    ) {
        if !lock(in_flight).insert(request.request_id.clone()) {
            let error = BridgeError::Protocol(format!(
                "Duplicate in-flight request id {}",
                request.request_id
            ));
            warn!(request_id = %request.request_id, "Dropping duplicate tunnel request");
            self.emitter
                .emit(BridgeEvent::error(EventSource::Tunnel, error.to_string()));
            return;
        }

        let inner = Arc::clone(self);
        let sender = Arc::clone(sender);
        let in_flight = Arc::clone(in_flight);
        tokio::spawn(async move { inner.answer(request, sender.as_ref(), &in_flight).await });
    }

    async fn answer(&self, request: LlmRequest, sender: &dyn FrameSender, in_flight: &InFlight) {
        let request_id = request.request_id.clone();
        debug!(request_id = %request_id, model = %request.model, "Tunnel request");

        let (response, tokens, error) = match self.inference.chat(request.to_chat_request()).await {
            Ok(chat) => (LlmResponse::success(&request_id, &chat), chat.tokens, None),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Tunnel request failed");
                let message = e.to_string();
                (
                    LlmResponse::failure(&request_id, message.clone()),
                    TokenCounts::default(),
                    Some(message),
                )
            }
        };
        lock(in_flight).remove(&request_id);

        send_response(sender, response).await;
        self.emitter.emit(BridgeEvent::RequestCompleted {
            request_id,
            model: request.model,
            prompt_tokens: tokens.prompt,
            completion_tokens: tokens.completion,
            success: error.is_none(),
            error,
        });
    }

    /// Answer a request that could not be decoded with an error response.
    async fn reject(
        &self,
        request_id: String,
        model: String,
        error: &BridgeError,
        sender: &dyn FrameSender,
    ) {
        warn!(request_id = %request_id, error = %error, "Rejecting malformed tunnel request");
        let message = error.to_string();
        send_response(sender, LlmResponse::failure(&request_id, message.clone())).await;
        self.emitter.emit(BridgeEvent::RequestCompleted {
            request_id,
            model,
            prompt_tokens: 0,
            completion_tokens: 0,
            success: false,
            error: Some(message),
        });
    }

    fn on_closed(&self, generation: u64) {
        let mut slot = lock(&self.connection);
        if slot.as_ref().is_some_and(|c| c.generation == generation) {
            *slot = None;
            self.set_status(TunnelStatus::Disconnected);
            info!("Tunnel closed by remote");
        }
    }
}

async fn send_response(sender: &dyn FrameSender, response: LlmResponse) {
    let request_id = response.request_id.clone();
    match TunnelFrame::LlmResponse(response).encode() {
        Ok(text) => {
            if let Err(e) = sender.send(text).await {
                warn!(request_id = %request_id, error = %e, "Failed to send tunnel response");
            }
        }
        Err(e) => warn!(request_id = %request_id, error = %e, "Failed to encode tunnel response"),
    }
}

async fn close_quietly(sender: &dyn FrameSender) {
    if let Err(e) = sender.close().await {
        debug!(error = %e, "Error closing tunnel");
    }
}
