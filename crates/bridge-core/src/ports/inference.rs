//! Inference port used by the tunnel client.

use async_trait::async_trait;

use crate::domain::{ChatRequest, ChatResponse};
use crate::error::BridgeResult;

/// Something that can answer chat requests and list the models it serves.
///
/// Implemented by the runtime controller; the tunnel client depends only on
/// this trait so it can be tested against a mock.
#[async_trait]
pub trait InferencePort: Send + Sync {
    /// Run a single non-streaming chat completion.
    async fn chat(&self, request: ChatRequest) -> BridgeResult<ChatResponse>;

    /// Names of the locally available models, from the last inventory refresh.
    async fn model_names(&self) -> Vec<String>;
}
