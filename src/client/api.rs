//! Chat-completion API client (OpenAI-compatible schema).
//!
//! Epistemic foundation:
//! - K_i: The chat-completions schema is the de facto standard
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON (might fail)
//!
//! One call here is one attempt; the retry/fallback policy lives in
//! [`crate::client::RetryPolicy`], not in this client.

use crate::models::{ApiError, GlossfillError, ModelSpec, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from a single completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Model that actually served the request
    pub model: String,
    /// Request duration
    pub duration: Duration,
}

/// Seam between the generation client and the wire.
///
/// The production implementation is [`ApiClient`]; tests substitute a
/// scripted one to exercise retry and dispatch behavior offline.
pub trait Complete: Send + Sync {
    fn complete<'a>(
        &'a self,
        model: &'a ModelSpec,
        messages: Vec<Message>,
    ) -> BoxFuture<'a, Result<CompletionResponse>>;
}

/// HTTPS chat-completion client.
pub struct ApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    requests_issued: AtomicU64,
}

impl ApiClient {
    /// Create a new client with a per-request timeout.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GlossfillError::Network)?;

        Ok(Self {
            client,
            api_key,
            base_url,
            timeout,
            requests_issued: AtomicU64::new(0),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| GlossfillError::Internal(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Issue one completion request. No internal retries.
    async fn complete_once(
        &self,
        model: &ModelSpec,
        messages: Vec<Message>,
    ) -> Result<CompletionResponse> {
        let start = Instant::now();
        self.requests_issued.fetch_add(1, Ordering::Relaxed);

        let request = ChatCompletionRequest {
            model: model.id.clone(),
            messages,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GlossfillError::Timeout(self.timeout)
                } else {
                    GlossfillError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = if status == 401 {
                ApiError::AuthenticationFailed
            } else if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                ApiError::Status {
                    status,
                    message: api_error.error.message,
                }
            } else {
                ApiError::Status {
                    status,
                    message: body,
                }
            };
            return Err(GlossfillError::Api(error));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GlossfillError::Parse(format!("decoding completion response: {e}")))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| {
                GlossfillError::Api(ApiError::InvalidResponse(
                    "no choices in response".to_string(),
                ))
            })?;

        let duration = start.elapsed();
        debug!(
            model = %model.id,
            chars = content.len(),
            duration_ms = duration.as_millis() as u64,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            model: body.model.unwrap_or_else(|| model.id.clone()),
            duration,
        })
    }

    /// Total requests issued over the life of this client.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }
}

impl Complete for ApiClient {
    fn complete<'a>(
        &'a self,
        model: &'a ModelSpec,
        messages: Vec<Message>,
    ) -> BoxFuture<'a, Result<CompletionResponse>> {
        Box::pin(self.complete_once(model, messages))
    }
}
