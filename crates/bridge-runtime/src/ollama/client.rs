//! HTTP client for the local Ollama API.
//!
//! Endpoints used:
//!
//! | Operation | Request |
//! |---|---|
//! | inventory | `GET /api/tags` |
//! | version | `GET /api/version` |
//! | chat | `POST /api/chat` with `stream: false` |
//! | pull | `POST /api/pull`, NDJSON progress stream |
//! | delete | `DELETE /api/delete` |

use std::time::Duration;

use bridge_core::{
    BridgeError, BridgeResult, ChatMessage, ChatRequest, ChatResponse, ModelDescriptor,
    PullProgress, TokenCounts,
};
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::pull::{LineBuffer, PullEvent, parse_pull_line};

/// Client for one runtime base URL. Cheap to construct; the underlying
/// `reqwest::Client` is shared.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: Url,
    probe_timeout: Duration,
    chat_timeout: Duration,
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digest: String,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl From<TagModel> for ModelDescriptor {
    fn from(model: TagModel) -> Self {
        Self {
            name: model.name,
            size_bytes: model.size,
            content_digest: model.digest,
            modified_at: model.modified_at,
            details: model.details,
        }
    }
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    model: Option<String>,
    message: Option<ChatMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Serialize)]
struct ModelBody<'a> {
    model: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

// ── Client ─────────────────────────────────────────────────────────────

impl OllamaClient {
    /// Client for `base_url`. Fails with a configuration error if the URL is invalid.
    pub fn new(http: Client, base_url: &str) -> BridgeResult<Self> {
        let mut url = Url::parse(base_url).map_err(|e| {
            BridgeError::Configuration(format!("Invalid local runtime URL '{base_url}': {e}"))
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url: url,
            probe_timeout: Duration::from_secs(3),
            chat_timeout: Duration::from_secs(300),
        })
    }

    #[must_use]
    pub const fn with_timeouts(mut self, probe: Duration, chat: Duration) -> Self {
        self.probe_timeout = probe;
        self.chat_timeout = chat;
        self
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> BridgeResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BridgeError::Internal(format!("Failed to build URL for {path}: {e}")))
    }

    /// Inventory call; also the reachability probe.
    pub async fn list_models(&self) -> BridgeResult<Vec<ModelDescriptor>> {
        let response = self
            .http
            .get(self.endpoint("api/tags")?)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| transport_error("List models", &e))?;
        let response = ensure_success(response, "List models").await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Protocol(format!("Invalid model list: {e}")))?;
        Ok(tags.models.into_iter().map(ModelDescriptor::from).collect())
    }

    pub async fn version(&self) -> BridgeResult<String> {
        let response = self
            .http
            .get(self.endpoint("api/version")?)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| transport_error("Version", &e))?;
        let response = ensure_success(response, "Version").await?;
        let body: VersionResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Protocol(format!("Invalid version response: {e}")))?;
        Ok(body.version)
    }

    /// Non-streaming chat completion. Token counts come from the runtime's
    /// `prompt_eval_count` / `eval_count`.
    pub async fn chat(&self, request: &ChatRequest) -> BridgeResult<ChatResponse> {
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: request.options.as_ref(),
        };
        debug!(model = %request.model, messages = request.messages.len(), "POST /api/chat");

        let response = self
            .http
            .post(self.endpoint("api/chat")?)
            .timeout(self.chat_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Chat", &e))?;
        let response = ensure_success(response, "Chat").await?;
        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| BridgeError::Protocol(format!("Invalid chat response: {e}")))?;

        Ok(ChatResponse {
            model: reply.model.unwrap_or_else(|| request.model.clone()),
            content: reply.message.map(|m| m.content).unwrap_or_default(),
            tokens: TokenCounts {
                prompt: reply.prompt_eval_count,
                completion: reply.eval_count,
            },
            done_reason: reply.done_reason,
        })
    }

    /// Pull a model, calling `on_progress` once per progress record in arrival order.
    ///
    /// Malformed records are skipped. A record carrying `error` fails the pull.
    pub async fn pull<F>(&self, model: &str, mut on_progress: F) -> BridgeResult<()>
    where
        F: FnMut(PullProgress) + Send,
    {
        let body = ModelBody {
            model,
            name: model,
            stream: Some(true),
        };
        let response = self
            .http
            .post(self.endpoint("api/pull")?)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Pull", &e))?;
        let response = ensure_success(response, "Pull").await?;

        let mut handle = |line: &str| -> BridgeResult<()> {
            match parse_pull_line(line) {
                Ok(PullEvent::Progress(progress)) => {
                    on_progress(progress);
                    Ok(())
                }
                Ok(PullEvent::Failed(message)) => Err(BridgeError::RuntimeExecution(format!(
                    "Pull of {model} failed: {message}"
                ))),
                Err(e) => {
                    debug!(error = %e, line, "Skipping malformed pull record");
                    Ok(())
                }
            }
        };

        let mut buffer = LineBuffer::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error("Pull stream", &e))?;
            for line in buffer.push(&chunk) {
                handle(&line)?;
            }
        }
        if let Some(line) = buffer.finish() {
            handle(&line)?;
        }
        Ok(())
    }

    pub async fn delete(&self, model: &str) -> BridgeResult<()> {
        let body = ModelBody {
            model,
            name: model,
            stream: None,
        };
        let response = self
            .http
            .delete(self.endpoint("api/delete")?)
            .timeout(self.probe_timeout.max(Duration::from_secs(30)))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Delete", &e))?;
        ensure_success(response, "Delete").await?;
        Ok(())
    }
}

fn transport_error(context: &str, e: &reqwest::Error) -> BridgeError {
    if e.is_connect() {
        BridgeError::Unavailable(format!("{context}: local runtime is not reachable ({e})"))
    } else if e.is_timeout() {
        BridgeError::Communication(format!("{context}: request timed out"))
    } else {
        BridgeError::Communication(format!("{context}: {e}"))
    }
}

async fn ensure_success(response: Response, context: &str) -> BridgeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    warn!(%status, error = %message, "{context} failed");

    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };
    Err(BridgeError::RuntimeExecution(format!(
        "{context} failed ({}): {message}",
        status.as_u16()
    )))
}
