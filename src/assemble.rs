//! Context assembly: uploaded documents → one ordered text blob.
//!
//! Each document is resolved through the [`ContentCache`] (extracting on a
//! miss) and the resulting texts are concatenated **in input order**, joined
//! by [`DOCUMENT_SEPARATOR`]. Resolution across the documents of one request
//! runs concurrently for latency, but `buffered` (not `buffer_unordered`)
//! keeps completion order out of the picture: the assembled context always
//! reads in upload order.
//!
//! Failure policy is fail-fast: the first document that cannot be resolved
//! aborts the request. Documents already extracted by then remain cached, so
//! retrying the request is cheap.

use crate::cache::ContentCache;
use crate::error::LecternError;
use crate::extract::DocumentExtractor;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Sentinel inserted between documents in the assembled context.
///
/// A multi-character token on its own line, chosen so the extractor cannot
/// plausibly produce it (a bare `---`, by contrast, is an everyday Markdown
/// horizontal rule). Lets [`split_context`] recover per-document segments
/// best-effort.
pub const DOCUMENT_SEPARATOR: &str = "\n=====[document-break]=====\n";

/// One uploaded document: a user-visible label and the raw bytes.
///
/// The label feeds extraction tags only; cache identity is derived from the
/// bytes alone.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub label: String,
    pub bytes: Vec<u8>,
}

impl DocumentSource {
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

/// Resolve every document and join the texts in input order.
///
/// Up to `concurrency` documents resolve at once; each extraction is bounded
/// by `extraction_timeout`.
pub async fn assemble_context(
    cache: &ContentCache,
    extractor: &Arc<dyn DocumentExtractor>,
    documents: &[DocumentSource],
    concurrency: usize,
    extraction_timeout: Duration,
) -> Result<String, LecternError> {
    debug!("assembling context from {} document(s)", documents.len());
    let texts = resolve_all(cache, extractor, documents, concurrency, extraction_timeout).await?;
    Ok(texts.join(DOCUMENT_SEPARATOR))
}

/// Resolve every document through the cache, returning texts in input order.
pub(crate) async fn resolve_all(
    cache: &ContentCache,
    extractor: &Arc<dyn DocumentExtractor>,
    documents: &[DocumentSource],
    concurrency: usize,
    extraction_timeout: Duration,
) -> Result<Vec<String>, LecternError> {
    stream::iter(documents.iter().map(|doc| {
        let cache = cache.clone();
        let extractor = Arc::clone(extractor);
        async move { resolve_document(&cache, &extractor, doc, extraction_timeout).await }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await
}

/// Best-effort inverse of assembly: split a blob back into per-document
/// segments.
///
/// Not guaranteed lossless — a document whose own text contains the
/// separator splits into extra segments.
pub fn split_context(blob: &str) -> Vec<&str> {
    blob.split(DOCUMENT_SEPARATOR).collect()
}

async fn resolve_document(
    cache: &ContentCache,
    extractor: &Arc<dyn DocumentExtractor>,
    doc: &DocumentSource,
    extraction_timeout: Duration,
) -> Result<String, LecternError> {
    cache
        .resolve(&doc.bytes, || async {
            match tokio::time::timeout(extraction_timeout, extractor.extract(&doc.bytes, &doc.label))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LecternError::ExtractionTimeout {
                    label: doc.label.clone(),
                    secs: extraction_timeout.as_secs(),
                }),
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Extractor that answers from a fixed table, counting invocations, with
    /// an optional per-label delay to force adversarial completion order.
    struct TableExtractor {
        calls: AtomicUsize,
        delays_ms: fn(&str) -> u64,
    }

    impl TableExtractor {
        fn instant() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delays_ms: |_| 0,
            })
        }

        fn slow_first() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delays_ms: |label| if label == "d1" { 150 } else { 0 },
            })
        }
    }

    #[async_trait]
    impl DocumentExtractor for TableExtractor {
        async fn extract(&self, _bytes: &[u8], label: &str) -> Result<String, LecternError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis((self.delays_ms)(label))).await;
            if label == "broken" {
                return Err(LecternError::ExtractionFailed {
                    label: label.to_string(),
                    detail: "unsupported format".to_string(),
                });
            }
            Ok(format!("text of {label}"))
        }
    }

    fn docs(labels: &[&str]) -> Vec<DocumentSource> {
        labels
            .iter()
            .map(|l| DocumentSource::new(*l, format!("bytes of {l}").into_bytes()))
            .collect()
    }

    #[tokio::test]
    async fn order_preserved_despite_slow_first_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let extractor: Arc<dyn DocumentExtractor> = TableExtractor::slow_first();

        let blob = assemble_context(&cache, &extractor, &docs(&["d1", "d2", "d3"]), 3, TIMEOUT)
            .await
            .unwrap();

        let p1 = blob.find("text of d1").unwrap();
        let p2 = blob.find("text of d2").unwrap();
        let p3 = blob.find("text of d3").unwrap();
        assert!(p1 < p2 && p2 < p3, "segments out of order: {blob}");
    }

    #[tokio::test]
    async fn separator_joins_and_splits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let extractor: Arc<dyn DocumentExtractor> = TableExtractor::instant();

        let blob = assemble_context(&cache, &extractor, &docs(&["a", "b"]), 2, TIMEOUT)
            .await
            .unwrap();

        assert_eq!(blob, format!("text of a{DOCUMENT_SEPARATOR}text of b"));
        assert_eq!(split_context(&blob), vec!["text of a", "text of b"]);
    }

    #[tokio::test]
    async fn single_document_has_no_separator() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let extractor: Arc<dyn DocumentExtractor> = TableExtractor::instant();

        let blob = assemble_context(&cache, &extractor, &docs(&["only"]), 4, TIMEOUT)
            .await
            .unwrap();
        assert!(!blob.contains(DOCUMENT_SEPARATOR));
    }

    #[tokio::test]
    async fn first_failure_aborts_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let extractor: Arc<dyn DocumentExtractor> = TableExtractor::instant();

        let err = assemble_context(&cache, &extractor, &docs(&["ok", "broken", "also-ok"]), 1, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::ExtractionFailed { .. }));
    }

    #[tokio::test]
    async fn duplicate_documents_extract_once_when_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let table = TableExtractor::instant();
        let extractor: Arc<dyn DocumentExtractor> = table.clone();

        let same = DocumentSource::new("d1", b"identical bytes".to_vec());
        let documents = vec![same.clone(), same];

        assemble_context(&cache, &extractor, &documents, 1, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(table.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_extraction_times_out() {
        struct Stuck;

        #[async_trait]
        impl DocumentExtractor for Stuck {
            async fn extract(&self, _bytes: &[u8], _label: &str) -> Result<String, LecternError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).unwrap();
        let extractor: Arc<dyn DocumentExtractor> = Arc::new(Stuck);

        let err = assemble_context(
            &cache,
            &extractor,
            &docs(&["slow"]),
            1,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LecternError::ExtractionTimeout { .. }));
    }
}
