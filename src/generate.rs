//! Eager (single-shot) generation entry points and the [`Lectern`] facade.
//!
//! `Lectern` wires the four core pieces together — configuration, content
//! cache, document extractor, completion provider — and exposes the
//! operations a presentation layer drives: list the modes, warm the cache,
//! generate. The streaming twin of [`Lectern::process`] lives in
//! [`crate::stream`].
//!
//! A request moves through fixed phases: **validating** (the mode id is
//! checked before any expensive work), **assembling** (documents resolve
//! through the cache), **dispatched** (one canonical completion call),
//! then **complete** or **failed**. Each request is independent; a failure
//! is isolated to the request that produced it.

use crate::assemble::{self, DocumentSource};
use crate::cache::ContentCache;
use crate::config::LecternConfig;
use crate::error::LecternError;
use crate::extract::{DocumentExtractor, PdfExtractor};
use crate::prompts::{self, UseCase, UseCaseInfo};
use crate::provider::{CompletionProvider, CompletionRequest, OpenAiCompatibleProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result row of [`Lectern::prepare`]: the document label and the first 100
/// characters of its extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedDocument {
    pub label: String,
    pub preview: String,
}

/// The study-material generator.
///
/// Construct once at startup from a [`LecternConfig`] and share freely —
/// every method takes `&self` and concurrent requests do not serialise on
/// each other.
pub struct Lectern {
    config: LecternConfig,
    cache: ContentCache,
    extractor: Arc<dyn DocumentExtractor>,
    provider: Arc<dyn CompletionProvider>,
}

impl Lectern {
    /// Build a generator from configuration.
    ///
    /// Component resolution, most-specific first: an override in
    /// `config.extractor` / `config.provider` wins (tests, custom
    /// middleware); otherwise the built-in [`PdfExtractor`] (with
    /// `config.ocr` if set) and [`OpenAiCompatibleProvider`] are used.
    pub fn new(config: LecternConfig) -> Result<Self, LecternError> {
        let cache = ContentCache::open(&config.cache_dir)?;

        let extractor: Arc<dyn DocumentExtractor> = match &config.extractor {
            Some(extractor) => Arc::clone(extractor),
            None => match &config.ocr {
                Some(ocr) => Arc::new(PdfExtractor::with_ocr(Arc::clone(ocr))),
                None => Arc::new(PdfExtractor::new()),
            },
        };

        let provider: Arc<dyn CompletionProvider> = match &config.provider {
            Some(provider) => Arc::clone(provider),
            None => Arc::new(OpenAiCompatibleProvider::from_config(&config)?),
        };

        debug!("lectern ready: {config:?}");
        Ok(Self {
            config,
            cache,
            extractor,
            provider,
        })
    }

    /// The configured generation modes, in presentation order. Static, no
    /// side effects.
    pub fn list_use_cases() -> Vec<UseCaseInfo> {
        UseCase::ALL.iter().map(|mode| mode.info()).collect()
    }

    /// The content cache backing this generator.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Remove cache entries older than the configured maximum age; returns
    /// the count removed. Run on demand or from a host scheduler — never on
    /// the request path.
    pub async fn expire_cache(&self) -> Result<usize, LecternError> {
        self.cache.expire(self.config.cache_max_age).await
    }

    /// Resolve every document into the cache (extracting on miss) and
    /// return a preview per document — a cache-warming operation so a later
    /// `process` call on the same uploads is fast.
    pub async fn prepare(
        &self,
        documents: &[DocumentSource],
    ) -> Result<Vec<PreparedDocument>, LecternError> {
        let texts = assemble::resolve_all(
            &self.cache,
            &self.extractor,
            documents,
            self.config.concurrency,
            self.config.extraction_timeout(),
        )
        .await?;

        Ok(documents
            .iter()
            .zip(texts)
            .map(|(doc, text)| PreparedDocument {
                label: doc.label.clone(),
                preview: text.chars().take(100).collect(),
            })
            .collect())
    }

    /// Generate study material in one blocking call.
    ///
    /// Validates `use_case_id` before any extraction or completion work
    /// happens; an unknown id costs nothing.
    pub async fn process(
        &self,
        use_case_id: &str,
        documents: &[DocumentSource],
    ) -> Result<String, LecternError> {
        let mode = self.validate(use_case_id)?;
        let context = self.assemble(documents).await?;
        let request = self.build_request(mode, &context);

        info!(
            "dispatching {} request ({} document(s), {} context chars)",
            mode.id(),
            documents.len(),
            context.len()
        );
        let text = self.provider.complete(&request).await?;
        info!("generation complete ({} chars)", text.len());
        Ok(text)
    }

    // ── Shared phases (also driven by crate::stream) ─────────────────────

    pub(crate) fn validate(&self, use_case_id: &str) -> Result<UseCase, LecternError> {
        UseCase::from_id(use_case_id).ok_or_else(|| LecternError::UnknownUseCase {
            id: use_case_id.to_string(),
        })
    }

    pub(crate) async fn assemble(
        &self,
        documents: &[DocumentSource],
    ) -> Result<String, LecternError> {
        assemble::assemble_context(
            &self.cache,
            &self.extractor,
            documents,
            self.config.concurrency,
            self.config.extraction_timeout(),
        )
        .await
    }

    pub(crate) fn build_request(&self, mode: UseCase, context: &str) -> CompletionRequest {
        CompletionRequest {
            system: mode.system_instruction(),
            user: prompts::user_message(context),
            max_tokens: self.config.max_output_tokens,
        }
    }

    pub(crate) fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }
}
