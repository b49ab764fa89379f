//! Transport port for the tunnel.
//!
//! The client only needs to open a connection, send text frames, close, and
//! read incoming text frames. Keeping that behind a trait lets the protocol
//! be tested against in-memory channels.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::BridgeError;
use futures_util::stream::BoxStream;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Connection is closed")]
    Closed,
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        Self::Communication(err.to_string())
    }
}

/// Write half of an open connection.
#[async_trait]
pub trait FrameSender: Send + Sync {
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&self) -> Result<(), TransportError>;
}

/// An open connection.
///
/// `incoming` yields text frames in arrival order and ends when the peer
/// closes or the connection fails.
pub struct TransportStream {
    pub sender: Arc<dyn FrameSender>,
    pub incoming: BoxStream<'static, String>,
}

impl std::fmt::Debug for TransportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStream").finish_non_exhaustive()
    }
}

/// Opens connections to a tunnel endpoint.
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<TransportStream, TransportError>;
}
