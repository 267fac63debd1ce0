//! Streaming completion engine
//!
//! [`StreamingEngine`] posts a chat request to an OpenAI-compatible
//! completions endpoint with `stream: true`, decodes the `data:` event stream
//! as it arrives, and hands every text delta to the caller before reading
//! the next chunk.
//!
//! One request may be in flight per engine. Starting a new request cancels
//! the previous one through its [`AbortHandle`]; the handle is released when
//! the request finishes, fails, or is aborted, so a stale abort can never hit
//! a later request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use metrics::{counter, histogram, increment_counter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::ApiConfig;
use crate::error::{PolychatError, Result};

pub mod sse;
pub mod usage;

use sse::{DecodedStream, Flow, StreamDecoder};
pub use usage::Usage;

/// A message as sent to the completion API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ApiMessage {
    /// Create a message with an arbitrary role
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Outcome of one streamed completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    /// Accumulated assistant text (partial when aborted)
    pub content: String,
    /// Whether the stream was cancelled before it ended
    pub aborted: bool,
    /// Server usage when reported, otherwise an estimate
    pub usage: Usage,
    /// Cost reported by the server, if any
    pub cost_usd: Option<f64>,
}

impl CompletionResult {
    /// Build a result from decoded stream state
    ///
    /// Falls back to an estimated usage over `prompt` and the decoded
    /// content when the server never reported usage.
    pub fn from_decoded(prompt: &[ApiMessage], decoded: DecodedStream, aborted: bool) -> Self {
        let usage = decoded.usage.unwrap_or_else(|| {
            Usage::estimate(prompt.iter().map(|m| m.content.as_str()), &decoded.content)
        });
        Self {
            content: decoded.content,
            aborted,
            usage,
            cost_usd: decoded.cost,
        }
    }
}

/// Cancellation handle for one in-flight request
///
/// Cloning shares the underlying token; aborting any clone cancels the
/// request it was issued for and nothing else.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    id: u64,
    token: CancellationToken,
}

impl AbortHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
        }
    }

    /// Request identifier this handle belongs to
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the request
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Whether the request has been cancelled
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Seam between the conversation store and whatever produces completions
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Stream a completion for `messages`
    ///
    /// `on_delta` receives each text fragment in wire order. An aborted
    /// stream is not an error: it returns normally with `aborted` set.
    ///
    /// # Errors
    ///
    /// Transport failures and non-success responses.
    async fn stream_completion(
        &self,
        messages: &[ApiMessage],
        model: &str,
        credential: &str,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<CompletionResult>;

    /// Cancel the in-flight request, if any
    fn cancel(&self);
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [ApiMessage],
}

/// HTTP implementation of [`CompletionEngine`]
pub struct StreamingEngine {
    client: Client,
    endpoint: String,
    referer: Option<String>,
    app_title: Option<String>,
    active: Mutex<Option<AbortHandle>>,
    next_request_id: AtomicU64,
}

impl StreamingEngine {
    /// Create an engine for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::config::ApiConfig;
    /// use polychat::engine::StreamingEngine;
    ///
    /// let engine = StreamingEngine::new(&ApiConfig::default());
    /// assert!(engine.is_ok());
    /// ```
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("polychat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PolychatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized streaming engine: endpoint={}", config.endpoint);

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            referer: non_empty(&config.referer),
            app_title: non_empty(&config.app_title),
            active: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Handle for the request currently in flight
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.active.lock().ok().and_then(|slot| slot.clone())
    }

    /// Whether a request is currently in flight
    pub fn is_streaming(&self) -> bool {
        self.abort_handle().is_some()
    }

    /// Register a new request, cancelling any previous one
    fn begin_request(&self) -> ActiveRequest<'_> {
        let handle = AbortHandle::new(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut slot) = self.active.lock() {
            if let Some(previous) = slot.replace(handle.clone()) {
                tracing::debug!("Cancelling previous request {}", previous.id());
                previous.abort();
            }
        }
        ActiveRequest {
            engine: self,
            handle,
        }
    }

    fn release(&self, id: u64) {
        if let Ok(mut slot) = self.active.lock() {
            if slot.as_ref().map(AbortHandle::id) == Some(id) {
                *slot = None;
            }
        }
    }
}

/// Keeps a request registered on its engine until dropped
struct ActiveRequest<'a> {
    engine: &'a StreamingEngine,
    handle: AbortHandle,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.engine.release(self.handle.id());
    }
}

#[async_trait]
impl CompletionEngine for StreamingEngine {
    async fn stream_completion(
        &self,
        messages: &[ApiMessage],
        model: &str,
        credential: &str,
        on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
    ) -> Result<CompletionResult> {
        let request = self.begin_request();
        let token = request.handle.token().clone();
        let started = Instant::now();
        increment_counter!("completion_streams_total");

        tracing::debug!(
            "Sending completion request {}: model={}, {} messages",
            request.handle.id(),
            model,
            messages.len()
        );

        let body = ChatRequest {
            model,
            stream: true,
            messages,
        };
        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&body);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.app_title {
            builder = builder.header("X-Title", title);
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!("Completion request aborted before response");
                increment_counter!("completion_stream_aborts_total");
                return Ok(CompletionResult::from_decoded(messages, DecodedStream::default(), true));
            }
            sent = builder.send() => sent.map_err(|e| {
                tracing::error!("Completion request failed: {}", e);
                increment_counter!("completion_stream_errors_total");
                PolychatError::Http(e)
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Completion endpoint returned {}: {}", status, body);
            increment_counter!("completion_stream_errors_total");
            return Err(PolychatError::api_from_body(status.as_u16(), &body).into());
        }

        let (decoded, aborted) = read_stream(response.bytes_stream(), &token, on_delta)
            .await
            .map_err(|e| {
                increment_counter!("completion_stream_errors_total");
                e
            })?;

        if decoded.malformed_lines > 0 {
            counter!(
                "completion_stream_malformed_lines_total",
                decoded.malformed_lines as u64
            );
        }
        if aborted {
            increment_counter!("completion_stream_aborts_total");
        }
        histogram!(
            "completion_stream_duration_seconds",
            started.elapsed().as_secs_f64()
        );

        tracing::info!(
            "Completion {} finished: {} chars, aborted={}",
            request.handle.id(),
            decoded.content.len(),
            aborted
        );

        Ok(CompletionResult::from_decoded(messages, decoded, aborted))
    }

    fn cancel(&self) {
        if let Ok(mut slot) = self.active.lock() {
            if let Some(handle) = slot.take() {
                tracing::info!("Cancelling request {}", handle.id());
                handle.abort();
            }
        }
    }
}

/// Drive a body stream through a [`StreamDecoder`] until it ends
///
/// Stops at the `[DONE]` terminator, at end of body, or when `token` is
/// cancelled. Returns the decoded state and whether it was cancelled.
///
/// # Errors
///
/// Returns `PolychatError::Stream` when the body stream itself fails.
pub async fn read_stream<S, E>(
    stream: S,
    token: &CancellationToken,
    on_delta: &mut (dyn for<'s> FnMut(&'s str) + Send),
) -> Result<(DecodedStream, bool)>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    tokio::pin!(stream);

    let mut decoder = StreamDecoder::new();
    let mut aborted = false;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                aborted = true;
                break;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    if decoder.feed(&bytes, &mut *on_delta) == Flow::Done {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Completion stream failed: {}", e);
                    return Err(PolychatError::Stream(e.to_string()).into());
                }
                None => {
                    decoder.finish(&mut *on_delta);
                    break;
                }
            },
        }
    }

    Ok((decoder.into_decoded(), aborted))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
