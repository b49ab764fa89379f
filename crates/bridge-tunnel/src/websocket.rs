//! WebSocket implementation of [`TunnelTransport`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, SplitSink};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::transport::{FrameSender, TransportError, TransportStream, TunnelTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Connects over `ws://` or `wss://` using `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub const fn new() -> Self {
        Self
    }
}

struct WebSocketSender {
    writer: Mutex<Option<WsWriter>>,
}

#[async_trait]
impl FrameSender for WebSocketSender {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        writer
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

#[async_trait]
impl TunnelTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &Url) -> Result<TransportStream, TransportError> {
        let (socket, _response) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    endpoint: redact(endpoint),
                    message: e.to_string(),
                })?;
        let (writer, reader) = socket.split();

        let incoming = stream::unfold(reader, |mut reader| async move {
            loop {
                match reader.next().await? {
                    Ok(Message::Text(text)) => return Some((text.to_string(), reader)),
                    Ok(Message::Ping(payload)) => {
                        debug!(bytes = payload.len(), "Tunnel ping");
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Tunnel closed by peer");
                        return None;
                    }
                    Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
                    Err(e) => {
                        warn!(error = %e, "Tunnel read error");
                        return None;
                    }
                }
            }
        })
        .boxed();

        Ok(TransportStream {
            sender: Arc::new(WebSocketSender {
                writer: Mutex::new(Some(writer)),
            }),
            incoming,
        })
    }
}

/// The endpoint without its query, so the token never reaches logs.
fn redact(endpoint: &Url) -> String {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_drops_token() {
        let url = Url::parse("wss://h.example/api/llm-bridge/connect?token=secret").unwrap();
        assert_eq!(redact(&url), "wss://h.example/api/llm-bridge/connect");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}/api/llm-bridge/connect?token=t")).unwrap();
        let err = WebSocketTransport::new().connect(&url).await.unwrap_err();
        assert!(
            matches!(&err, TransportError::Connect { endpoint, .. } if !endpoint.contains("token"))
        );
    }
}
