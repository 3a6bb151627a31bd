//! Completion-service interaction: the provider seam and its HTTP
//! implementation.
//!
//! The dispatcher depends only on [`CompletionProvider`]; tests inject spy
//! providers through [`crate::LecternConfig::provider`].
//! [`OpenAiCompatibleProvider`] is the production implementation, speaking
//! the Chat Completions wire format against any compatible base URL
//! (api.openai.com, vLLM, Ollama, LM Studio, …).
//!
//! ## Retry strategy
//!
//! Eager calls retry transient failures with exponential backoff
//! (`retry_backoff_ms * 2^attempt`); a server-specified `Retry-After` is
//! honoured when present. Authentication failures are never retried.
//! Streaming calls are dispatched once: after the first fragment reaches
//! the consumer a retry would replay output, so failures surface as
//! [`LecternError::StreamInterrupted`] instead.

use crate::error::LecternError;
use crate::stream::FragmentStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// One completion-service call: a system-role instruction, a user-role
/// message, and an output-size bound.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// The completion service, consumed as a black box.
///
/// Both methods are cancellable by dropping the returned future (or the
/// stream): the underlying HTTP request is aborted and nothing further is
/// emitted.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// One blocking call returning the complete text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LecternError>;

    /// A lazy, finite, single-pass sequence of text fragments whose
    /// concatenation equals the complete text.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, LecternError>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from the relevant config fields.
    ///
    /// With no explicit key configured, `OPENAI_API_KEY` is consulted;
    /// local endpoints may legitimately run with neither.
    pub fn from_config(config: &crate::config::LecternConfig) -> Result<Self, LecternError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!("no API key configured; proceeding unauthenticated");
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LecternError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> ChatRequestBody {
        ChatRequestBody {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user.clone(),
                },
            ],
            max_tokens: request.max_tokens,
            stream,
        }
    }

    /// Send the request and map non-success statuses onto the error
    /// taxonomy. `bounded` applies the per-call timeout — used for eager
    /// calls only, since a healthy stream may legitimately outlive it.
    async fn send(
        &self,
        body: &ChatRequestBody,
        bounded: bool,
    ) -> Result<reqwest::Response, LecternError> {
        let mut req = self.client.post(self.chat_url()).json(body);
        if bounded {
            req = req.timeout(self.api_timeout);
        }
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LecternError::CompletionTimeout {
                    secs: self.api_timeout.as_secs(),
                }
            } else {
                LecternError::CompletionFailed {
                    message: format!("network error: {e}"),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        let detail = response.text().await.unwrap_or_default();

        Err(match status.as_u16() {
            401 | 403 => LecternError::AuthFailed { detail },
            429 => LecternError::RateLimited { retry_after_secs },
            code => LecternError::CompletionFailed {
                message: format!("HTTP {code}: {detail}"),
            },
        })
    }

    async fn try_complete(&self, body: &ChatRequestBody) -> Result<String, LecternError> {
        let response = self.send(body, true).await?;
        let parsed: ChatResponseBody =
            response
                .json()
                .await
                .map_err(|e| LecternError::CompletionFailed {
                    message: format!("malformed response body: {e}"),
                })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LecternError::CompletionFailed {
                message: "response contained no choices".to_string(),
            })?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LecternError> {
        let body = self.request_body(request, false);
        let mut last_err: Option<LecternError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = match &last_err {
                    Some(LecternError::RateLimited {
                        retry_after_secs: Some(secs),
                    }) => Duration::from_secs(*secs),
                    _ => Duration::from_millis(self.retry_backoff_ms * 2u64.pow(attempt - 1)),
                };
                warn!(
                    "completion retry {attempt}/{} after {backoff:?}",
                    self.max_retries
                );
                sleep(backoff).await;
            }

            match self.try_complete(&body).await {
                Ok(text) => return Ok(text),
                Err(e @ LecternError::AuthFailed { .. }) => return Err(e),
                Err(e) => {
                    warn!("completion attempt {} failed: {e}", attempt + 1);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LecternError::Internal("retry loop exhausted without an error".to_string())
        }))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<FragmentStream, LecternError> {
        let body = self.request_body(request, true);
        let response = self.send(&body, false).await?;
        let bytes = response.bytes_stream().map_err(|e| e.to_string());
        Ok(Box::pin(SseFragments::new(bytes)))
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ── SSE fragment stream ──────────────────────────────────────────────────────

/// Parses a server-sent-events byte stream into per-fragment text deltas.
///
/// Events are separated by a blank line; each `data:` payload is either a
/// JSON chunk carrying a delta or the literal `[DONE]` terminator. The
/// buffer is kept as raw bytes because chunk boundaries can split multi-byte
/// UTF-8 sequences (and JSON payloads) arbitrarily; decoding happens per
/// complete event.
///
/// A transport error, or end-of-stream without `[DONE]`, yields one final
/// `Err(StreamInterrupted)` — the fragments already emitted remain valid.
struct SseFragments {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl SseFragments {
    fn new(inner: impl Stream<Item = Result<Bytes, String>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Pop the next complete event out of the buffer, if one is there.
    fn next_buffered_event(&mut self) -> Option<SseEvent> {
        let boundary = self
            .buffer
            .windows(2)
            .position(|w| w == b"\n\n")?;
        let event: Vec<u8> = self.buffer.drain(..boundary + 2).take(boundary).collect();
        Some(parse_event(&event))
    }
}

/// What one SSE event amounted to.
enum SseEvent {
    Fragment(String),
    Done,
    /// Keep-alive, role-only delta, empty delta, or unparseable chunk.
    Nothing,
}

fn parse_event(event: &[u8]) -> SseEvent {
    let text = String::from_utf8_lossy(event);
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return SseEvent::Done;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => {
                if let Some(content) = chunk.choices.first().and_then(|c| c.delta.content.as_ref())
                {
                    if !content.is_empty() {
                        return SseEvent::Fragment(content.clone());
                    }
                }
            }
            Err(e) => debug!("skipping unparseable SSE chunk: {e}"),
        }
    }
    SseEvent::Nothing
}

impl Stream for SseFragments {
    type Item = Result<String, LecternError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            // Drain complete events already buffered before polling for more.
            while let Some(event) = self.next_buffered_event() {
                match event {
                    SseEvent::Fragment(text) => return Poll::Ready(Some(Ok(text))),
                    SseEvent::Done => {
                        self.finished = true;
                        return Poll::Ready(None);
                    }
                    SseEvent::Nothing => {}
                }
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(detail))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(LecternError::StreamInterrupted { detail })));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    // A well-behaved server terminates with [DONE]; an EOF
                    // without it means the tail was lost.
                    return Poll::Ready(Some(Err(LecternError::StreamInterrupted {
                        detail: "stream ended before completion ([DONE] not received)"
                            .to_string(),
                    })));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn delta_chunk(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    async fn collect(stream: SseFragments) -> Vec<Result<String, LecternError>> {
        stream.collect().await
    }

    fn ok_bytes(chunks: Vec<&[u8]>) -> impl Stream<Item = Result<Bytes, String>> + Send + 'static {
        futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn fragments_arrive_in_order() {
        let wire = format!(
            "{}{}{}data: [DONE]\n\n",
            delta_chunk("Hello"),
            delta_chunk(" "),
            delta_chunk("world")
        );
        let items = collect(SseFragments::new(ok_bytes(vec![wire.as_bytes()]))).await;
        let fragments: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["Hello", " ", "world"]);
    }

    #[tokio::test]
    async fn empty_and_role_only_deltas_are_skipped() {
        let wire = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}{}data: [DONE]\n\n",
            delta_chunk(""),
            delta_chunk("text")
        );
        let items = collect(SseFragments::new(ok_bytes(vec![wire.as_bytes()]))).await;
        let fragments: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["text"]);
    }

    #[tokio::test]
    async fn events_split_across_chunk_boundaries_reassemble() {
        // Split mid-JSON and mid-UTF-8 (the 'é' in "café" is two bytes).
        let wire = format!("{}data: [DONE]\n\n", delta_chunk("café"));
        let bytes = wire.as_bytes();
        let cut = wire.find('\u{e9}').unwrap() + 1; // inside the é sequence
        let items = collect(SseFragments::new(ok_bytes(vec![
            &bytes[..10],
            &bytes[10..cut],
            &bytes[cut..],
        ])))
        .await;
        let fragments: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["café"]);
    }

    #[tokio::test]
    async fn eof_without_done_is_interrupted() {
        let wire = delta_chunk("partial");
        let mut items = collect(SseFragments::new(ok_bytes(vec![wire.as_bytes()]))).await;
        let last = items.pop().unwrap();
        assert!(matches!(last, Err(LecternError::StreamInterrupted { .. })));
        assert_eq!(items.pop().unwrap().unwrap(), "partial");
    }

    #[tokio::test]
    async fn transport_error_surfaces_after_emitted_prefix() {
        let first = delta_chunk("Hello");
        let stream = futures::stream::iter(vec![
            Ok(Bytes::copy_from_slice(first.as_bytes())),
            Err("connection reset by peer".to_string()),
        ]);
        let items = collect(SseFragments::new(stream)).await;
        assert_eq!(items[0].as_ref().unwrap(), "Hello");
        match &items[1] {
            Err(LecternError::StreamInterrupted { detail }) => {
                assert!(detail.contains("connection reset"));
            }
            other => panic!("expected StreamInterrupted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nothing_is_emitted_after_done() {
        let wire = format!("{}data: [DONE]\n\n{}", delta_chunk("a"), delta_chunk("ghost"));
        let items = collect(SseFragments::new(ok_bytes(vec![wire.as_bytes()]))).await;
        let fragments: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["a"]);
    }

    #[test]
    fn chat_url_joins_without_double_slash() {
        let config = crate::config::LecternConfig::builder()
            .api_base_url("http://localhost:11434/v1/")
            .build()
            .unwrap();
        let provider = OpenAiCompatibleProvider::from_config(&config).unwrap();
        assert_eq!(provider.chat_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_body_carries_roles_and_bound() {
        let config = crate::config::LecternConfig::builder()
            .model("gpt-4o")
            .build()
            .unwrap();
        let provider = OpenAiCompatibleProvider::from_config(&config).unwrap();
        let body = provider.request_body(
            &CompletionRequest {
                system: "sys".into(),
                user: "usr".into(),
                max_tokens: 4096,
            },
            true,
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
    }
}
