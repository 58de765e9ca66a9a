//! OpenAI-compatible chat and embeddings client.
//!
//! The pipelines talk to the model provider only through the [`ChatModel`]
//! and [`Embedder`] traits, so tests can swap in doubles. [`OpenAiClient`]
//! is the real implementation: one request per call, no retries, no
//! streaming.

pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use testsmith_shared::{ApiKey, Result, TestsmithError};

pub use types::{ChatRequest, ChatResponse, Message, Usage};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("testsmith/", env!("CARGO_PKG_VERSION"));

/// Longest error body echoed back in an [`TestsmithError::Api`] message.
const MAX_ERROR_BODY: usize = 500;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// A hosted model that turns one prompt into one answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_id(&self) -> &str;

    /// Send `prompt` as a single user message and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Turns texts into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding model identifier, recorded in the persisted index.
    fn model_id(&self) -> &str;

    /// Embed every text; output order matches input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Client for the OpenAI REST API (or anything speaking its dialect).
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    base_url: String,
}

impl OpenAiClient {
    /// Build a client for `base_url` authenticated with `api_key`.
    pub fn new(api_key: ApiKey, base_url: &str) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| TestsmithError::config(format!("invalid base_url '{base_url}': {e}")))?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TestsmithError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bind this client to a chat model.
    pub fn chat_model(&self, model: impl Into<String>) -> OpenAiChatModel {
        OpenAiChatModel {
            client: self.clone(),
            model: model.into(),
        }
    }

    /// Bind this client to an embedding model.
    pub fn embedder(&self, model: impl Into<String>) -> OpenAiEmbedder {
        OpenAiEmbedder {
            client: self.clone(),
            model: model.into(),
        }
    }

    /// Chat completion: returns the first choice's message content.
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                TestsmithError::Network(format!("{url}: {e}"))
            })?;

        let body = read_success_body(response, &url).await?;
        let raw: types::ChatResponseRaw = serde_json::from_str(&body)
            .map_err(|e| TestsmithError::parse(format!("chat completion response: {e}")))?;

        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TestsmithError::api(200, "response contained no choices"))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| TestsmithError::api(200, "first choice has no message content"))?;

        debug!(
            duration_ms = start.elapsed().as_millis(),
            tokens = raw.usage.as_ref().map(|u| u.total_tokens),
            "chat completion"
        );

        Ok(ChatResponse {
            content,
            usage: raw.usage,
        })
    }

    /// Create embeddings for a batch of texts, in input order.
    #[instrument(skip_all, fields(model = %model, count = inputs.len()))]
    pub async fn create_embeddings(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = types::EmbeddingRequest {
            model,
            input: inputs,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "embedding request failed");
                TestsmithError::Network(format!("{url}: {e}"))
            })?;

        let body = read_success_body(response, &url).await?;
        let parsed: types::EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| TestsmithError::parse(format!("embedding response: {e}")))?;

        if parsed.data.len() != inputs.len() {
            return Err(TestsmithError::api(
                200,
                format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            ));
        }

        place_by_index(parsed.data, inputs.len())
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

/// Put each embedding at the slot named by its `index`.
///
/// Every slot in `0..expected` must be filled exactly once.
fn place_by_index(data: Vec<types::EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

    for item in data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            TestsmithError::api(
                200,
                format!("embedding index {} out of range for {expected} inputs", item.index),
            )
        })?;
        if slot.is_some() {
            return Err(TestsmithError::api(
                200,
                format!("duplicate embedding index {}", item.index),
            ));
        }
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| TestsmithError::api(200, format!("missing embedding index {i}")))
        })
        .collect()
}

/// Return the body of a 2xx response, or an `Api` error describing the failure.
async fn read_success_body(response: reqwest::Response, url: &str) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TestsmithError::Network(format!("{url}: failed to read body: {e}")))?;

    if status.is_success() {
        return Ok(body);
    }

    let message = match serde_json::from_str::<types::ApiErrorBody>(&body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    };
    warn!(%status, %message, "provider returned an error");
    Err(TestsmithError::api(status.as_u16(), message))
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

/// [`ChatModel`] backed by `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: OpenAiClient,
    model: String,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest::single_user(&self.model, prompt);
        Ok(self.client.chat_completion(&request).await?.content)
    }
}

/// [`Embedder`] backed by `/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.create_embeddings(&self.model, texts).await
    }
}
