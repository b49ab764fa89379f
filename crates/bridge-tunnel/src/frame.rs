//! Wire frames exchanged over the tunnel.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "register", "models": ["llama3"] }
//! { "type": "llm_request", "requestId": "r-1", "model": "llama3", "messages": [] }
//! { "type": "llm_response", "requestId": "r-1", "response": "hi", "done": true }
//! ```

use bridge_core::{BridgeError, BridgeResult, ChatMessage, ChatRequest, ChatResponse, TokenCounts};
use serde::{Deserialize, Serialize};

/// A single tunnel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TunnelFrame {
    /// Sent once after the connection opens.
    Register { models: Vec<String> },

    /// Inference request from the platform.
    LlmRequest(LlmRequest),

    /// Answer to an [`LlmRequest`], correlated by `requestId`.
    LlmResponse(LlmResponse),

    /// Any frame type this client does not handle.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    pub request_id: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Responses are always sent whole; the flag is accepted and ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl LlmRequest {
    pub fn to_chat_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponse {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub done: bool,
}

impl LlmResponse {
    pub fn success(request_id: impl Into<String>, chat: &ChatResponse) -> Self {
        Self {
            request_id: request_id.into(),
            response: Some(chat.content.clone()),
            tokens: Some(chat.tokens),
            error: None,
            done: true,
        }
    }

    pub fn failure(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            response: None,
            tokens: None,
            error: Some(error.into()),
            done: true,
        }
    }
}

impl TunnelFrame {
    /// Decode a text frame. Anything that is not a JSON object with a
    /// recognizable shape is a protocol error.
    pub fn decode(text: &str) -> BridgeResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| BridgeError::Protocol(format!("Malformed tunnel frame: {e}")))
    }

    /// For an `llm_request` that failed [`TunnelFrame::decode`], the
    /// `requestId` and `model` that can still be read from it. The request
    /// is answered with an error rather than dropped.
    pub fn undecodable_request(text: &str) -> Option<(String, String)> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        if value.get("type")?.as_str()? != "llm_request" {
            return None;
        }
        let request_id = value.get("requestId")?.as_str()?.to_string();
        let model = value
            .get("model")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some((request_id, model))
    }

    pub fn encode(&self) -> BridgeResult<String> {
        serde_json::to_string(self)
            .map_err(|e| BridgeError::Internal(format!("Failed to encode tunnel frame: {e}")))
    }
}
