//! Tunnel between the platform and the local inference runtime.
//!
//! The platform opens no inbound connection to the desktop. Instead the
//! [`TunnelClient`] dials out, registers the models it is willing to serve,
//! and answers `llm_request` frames by forwarding them to an
//! [`InferencePort`](bridge_core::InferencePort).
//!
//! # Structure
//!
//! - `frame` - JSON wire frames exchanged over the tunnel
//! - `endpoint` - Derivation of the tunnel endpoint from the remote URL
//! - `transport` - Transport port (`TunnelTransport`, `FrameSender`)
//! - `websocket` - `tokio-tungstenite` implementation of the transport port
//! - `client` - Connection lifecycle and request dispatch

#![deny(unsafe_code)]

pub mod client;
pub mod endpoint;
pub mod frame;
pub mod transport;
pub mod websocket;

pub use client::{TunnelClient, TunnelPolicy};
pub use endpoint::{TUNNEL_PATH, tunnel_endpoint};
pub use frame::{LlmRequest, LlmResponse, TunnelFrame};
pub use transport::{FrameSender, TransportError, TransportStream, TunnelTransport};
pub use websocket::WebSocketTransport;
