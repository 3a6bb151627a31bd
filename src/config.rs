//! Configuration for study-material generation.
//!
//! All runtime behaviour is controlled through [`LecternConfig`], built via
//! its [`LecternConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a configuration across concurrent requests and to diff
//! two runs to understand why their outputs differ. The struct is immutable
//! after `build()` — there is no process-global mutable state anywhere in
//! the crate; lifecycle is construction to drop.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::LecternError;
use crate::extract::{DocumentExtractor, ImageTextRecognizer};
use crate::provider::CompletionProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Seven days, the default entry lifetime for the content cache.
const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for a [`crate::Lectern`] instance.
///
/// Built via [`LecternConfig::builder()`] or [`LecternConfig::default()`].
///
/// # Example
/// ```rust
/// use lectern::LecternConfig;
///
/// let config = LecternConfig::builder()
///     .cache_dir("/var/cache/lectern")
///     .model("gpt-4o")
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct LecternConfig {
    /// Directory holding one file per content fingerprint. Default: `.lectern-cache`.
    ///
    /// The directory is the single source of truth for extracted text; it is
    /// created on [`crate::Lectern::new`] if absent and shared safely by any
    /// number of concurrent requests (and processes — entries are written
    /// atomically).
    pub cache_dir: PathBuf,

    /// Maximum age of a cache entry before [`crate::cache::ContentCache::expire`]
    /// removes it. Default: 7 days.
    ///
    /// Expiry runs only on demand (`lectern expire`, or a host-scheduled
    /// sweep) — never on the request hot path. A skipped sweep means
    /// unbounded cache growth, never wrong results: entries are write-once
    /// and content-addressed, so they cannot go stale by mutation.
    pub cache_max_age: Duration,

    /// Completion-service model identifier. Default: `gpt-4o`.
    pub model: String,

    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    /// Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// API key. If `None`, the provider falls back to the `OPENAI_API_KEY`
    /// environment variable; local endpoints may need neither.
    pub api_key: Option<String>,

    /// Maximum tokens the completion service may generate per request.
    /// Default: 4096.
    ///
    /// One bound for both eager and streaming mode. Setting this too low
    /// truncates study guides mid-sentence; 4096 covers a multi-section
    /// guide while keeping per-request cost predictable.
    pub max_output_tokens: u32,

    /// Number of documents of one request resolved concurrently. Default: 4.
    ///
    /// Extraction is CPU-bound (and OCR-heavy documents more so); a small
    /// width keeps the blocking pool responsive while still overlapping
    /// work. Assembled-context order is preserved regardless of this value.
    pub concurrency: usize,

    /// Maximum retry attempts on a transient completion failure. Default: 3.
    ///
    /// Applies to eager calls only. A streaming call that has already
    /// emitted fragments is never retried — the consumer has rendered the
    /// prefix, so the failure surfaces as
    /// [`LecternError::StreamInterrupted`] instead.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-completion-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Per-document extraction timeout in seconds. Default: 120.
    pub extraction_timeout_secs: u64,

    /// Pre-constructed completion provider. When set, `model`,
    /// `api_base_url` and `api_key` are ignored. The seam used by tests and
    /// by callers needing custom middleware.
    pub provider: Option<Arc<dyn CompletionProvider>>,

    /// Pre-constructed document extractor. When set, the built-in PDF
    /// extractor (and `ocr`) are not used.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,

    /// Recogniser for text embedded in raster images. `None` means embedded
    /// images contribute no text.
    pub ocr: Option<Arc<dyn ImageTextRecognizer>>,
}

impl Default for LecternConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".lectern-cache"),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            model: "gpt-4o".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            max_output_tokens: 4096,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            extraction_timeout_secs: 120,
            provider: None,
            extractor: None,
            ocr: None,
        }
    }
}

impl fmt::Debug for LecternConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LecternConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_max_age", &self.cache_max_age)
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_output_tokens", &self.max_output_tokens)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn CompletionProvider>"))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn DocumentExtractor>"))
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn ImageTextRecognizer>"))
            .finish()
    }
}

impl LecternConfig {
    /// Create a new builder for `LecternConfig`.
    pub fn builder() -> LecternConfigBuilder {
        LecternConfigBuilder {
            config: Self::default(),
        }
    }

    /// Extraction timeout as a [`Duration`].
    pub(crate) fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

/// Builder for [`LecternConfig`].
#[derive(Debug)]
pub struct LecternConfigBuilder {
    config: LecternConfig,
}

impl LecternConfigBuilder {
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn cache_max_age(mut self, age: Duration) -> Self {
        self.config.cache_max_age = age;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn ocr(mut self, ocr: Arc<dyn ImageTextRecognizer>) -> Self {
        self.config.ocr = Some(ocr);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<LecternConfig, LecternError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(LecternError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.max_output_tokens == 0 {
            return Err(LecternError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.cache_max_age.is_zero() {
            return Err(LecternError::InvalidConfig(
                "cache_max_age must be non-zero".into(),
            ));
        }
        if c.provider.is_none() && c.api_base_url.is_empty() {
            return Err(LecternError::InvalidConfig(
                "api_base_url must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
