//! # lectern
//!
//! Generate study materials — study guides, flashcards, example questions,
//! summaries — from uploaded PDF course documents, using any
//! OpenAI-compatible completion service.
//!
//! ## Why this crate?
//!
//! The expensive part of turning lecture slides into study material is not
//! the completion call — it is extracting text (and OCR-ing embedded
//! images) from the PDFs, and users upload the same decks over and over.
//! lectern deduplicates that work with a content-addressed durable cache:
//! extraction runs once per distinct byte sequence, survives restarts, and
//! renamed copies of the same file still hit.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Fingerprint  SHA-256 over the uploaded bytes
//!  ├─ 2. Resolve      cache hit, or extract (pdfium + OCR seam) and store
//!  ├─ 3. Assemble     join texts in upload order, sentinel-separated
//!  ├─ 4. Dispatch     mode template + context → completion service
//!  └─ 5. Output       complete text, or a fragment stream
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lectern::{DocumentSource, Lectern, LecternConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from OPENAI_API_KEY unless set explicitly.
//!     let lectern = Lectern::new(LecternConfig::default())?;
//!
//!     let bytes = std::fs::read("lecture4.pdf")?;
//!     let docs = vec![DocumentSource::new("lecture4.pdf", bytes)];
//!
//!     let guide = lectern.process("STUDY_GUIDE", &docs).await?;
//!     println!("{guide}");
//!     Ok(())
//! }
//! ```
//!
//! Streaming, with incremental rendering:
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lectern::{DocumentSource, Lectern, LecternConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lectern = Lectern::new(LecternConfig::default())?;
//! let docs = vec![DocumentSource::new("notes.pdf", std::fs::read("notes.pdf")?)];
//! let mut fragments = lectern.process_stream("FLASHCARD_CREATION", &docs).await?;
//! while let Some(fragment) = fragments.next().await {
//!     print!("{}", fragment?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lectern` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! lectern = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod normalize;
pub mod prompts;
pub mod provider;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{split_context, DocumentSource, DOCUMENT_SEPARATOR};
pub use cache::{ContentCache, Fingerprint};
pub use config::{LecternConfig, LecternConfigBuilder};
pub use error::LecternError;
pub use extract::{DocumentExtractor, ImageTextRecognizer, PdfExtractor};
pub use generate::{Lectern, PreparedDocument};
pub use prompts::{UseCase, UseCaseInfo};
pub use provider::{CompletionProvider, CompletionRequest, OpenAiCompatibleProvider};
pub use stream::FragmentStream;
