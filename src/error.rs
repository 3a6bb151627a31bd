//! Error types for the lectern library.
//!
//! One enum covers the whole crate, but the variants fall into four families
//! a caller can act on differently:
//!
//! * `UnknownUseCase` — the request named a generation mode that does not
//!   exist. Rejected at the boundary before any extraction or completion
//!   call; nothing has happened yet.
//! * `ExtractionFailed` / `ExtractionTimeout` — a document could not be
//!   processed. Never cached, so a later request with the same bytes retries
//!   extraction from scratch.
//! * `CacheIo` — the durable store itself is unusable (unreadable directory,
//!   failed scan). Individual entry reads and writes degrade to a miss or a
//!   warning instead of surfacing here; only `open` and `expire` return it.
//! * `CompletionFailed` / `CompletionTimeout` / `RateLimited` / `AuthFailed`
//!   / `StreamInterrupted` — the completion service misbehaved. In streaming
//!   mode an already-emitted prefix stays valid; `StreamInterrupted` tells
//!   the consumer the tail is missing rather than silently truncating.
//!
//! Every failure is scoped to the request that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the lectern library.
#[derive(Debug, Error)]
pub enum LecternError {
    // ── Request validation ────────────────────────────────────────────────
    /// The request named a generation mode that is not configured.
    ///
    /// Mode ids are case-sensitive; see [`crate::prompts::UseCase::ALL`].
    #[error("unknown use case '{id}'\nValid ids: STUDY_GUIDE, EXAMPLE_QUESTIONS, FLASHCARD_CREATION, CONCEPT_EXPLANATIONS, ESSAY_OUTLINE, LECTURE_SUMMARIES, PROOFREADING")]
    UnknownUseCase { id: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The extractor could not process a document (corrupt file, unsupported
    /// format, empty result).
    #[error("failed to extract '{label}': {detail}")]
    ExtractionFailed { label: String, detail: String },

    /// Extraction exceeded the configured timeout.
    #[error("extraction of '{label}' timed out after {secs}s\nIncrease extraction_timeout_secs for large or image-heavy documents.")]
    ExtractionTimeout { label: String, secs: u64 },

    // ── Cache errors ──────────────────────────────────────────────────────
    /// The cache directory could not be created or scanned.
    #[error("cache I/O failure at '{path}': {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Completion-service errors ─────────────────────────────────────────
    /// The completion service returned a non-retryable error, or retries
    /// were exhausted.
    #[error("completion service error: {message}")]
    CompletionFailed { message: String },

    /// The completion call exceeded the configured timeout.
    #[error("completion service call timed out after {secs}s")]
    CompletionTimeout { secs: u64 },

    /// The completion service returned HTTP 429 — back off before retrying.
    ///
    /// `retry_after_secs` carries a server-specified delay when one was sent.
    #[error("completion service rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The completion service rejected the credentials (401/403).
    #[error("completion service authentication failed: {detail}\nCheck the configured API key (or the OPENAI_API_KEY environment variable).")]
    AuthFailed { detail: String },

    /// A streaming response terminated before completing.
    ///
    /// Fragments emitted before the interruption remain valid; the
    /// concatenated prefix is what the service actually produced.
    #[error("response stream interrupted: {detail}")]
    StreamInterrupted { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
