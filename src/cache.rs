//! Content-addressed cache for extracted document text.
//!
//! Extraction is the expensive step of every request — seconds of PDF
//! parsing and OCR per document — and users re-upload the same lecture
//! slides over and over. The cache deduplicates that work by addressing
//! entries with a SHA-256 digest of the uploaded bytes: identical bytes hit
//! the same entry no matter what the file is called, and a renamed copy can
//! never poison another document's entry.
//!
//! ## Storage layout
//!
//! One file per fingerprint in the cache directory, named by the digest's
//! 64-character lowercase hex, containing the raw extracted text as its
//! entire payload. No envelope, no index: the entry's age is its filesystem
//! mtime, and the directory itself is the single source of truth. Nothing is
//! mirrored in memory.
//!
//! ## Write-once, no locks
//!
//! Extraction is deterministic, so two writers racing on the same
//! fingerprint are writing identical bytes — last-writer-wins through an
//! atomic temp-file + rename is all the coordination needed, and resolutions
//! of distinct fingerprints never block each other. The only staleness
//! source is elapsed time, handled by [`ContentCache::expire`].

use crate::error::LecternError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// SHA-256 digest of an uploaded document's exact byte sequence.
///
/// The sole cache key: no filename or metadata participates in identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a byte sequence. Pure and deterministic.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Lowercase hexadecimal rendering, used as the on-disk entry name.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }

    /// Parse a 64-character lowercase hex string back into a fingerprint.
    ///
    /// Returns `None` for anything else — which is exactly how the
    /// expiration sweep tells cache entries apart from temp files and
    /// foreign debris in the same directory.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            out[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(out))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Durable, content-addressed store of extracted document text.
///
/// Cheap to clone; every clone points at the same directory. Consumers go
/// through [`ContentCache::resolve`] — `lookup` and `store` are the internal
/// halves it is built from.
#[derive(Clone, Debug)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LecternError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| LecternError::CacheIo {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    /// The directory this cache stores entries in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(fingerprint.to_hex())
    }

    /// Read the entry for `fingerprint`, or `None` on a miss.
    ///
    /// Any unreadable entry — absent, permission-denied, not valid UTF-8 —
    /// is a miss, never a fatal error: the caller falls back to re-running
    /// extraction, which is correct (if slower) regardless of what is wrong
    /// with the file.
    pub(crate) fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        let path = self.entry_path(fingerprint);
        match std::fs::read(&path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!("cache entry {} is not valid UTF-8, treating as miss: {e}", fingerprint);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("cache entry {} unreadable, treating as miss: {e}", fingerprint);
                None
            }
        }
    }

    /// Write the entry for `fingerprint`.
    ///
    /// The write goes to a uniquely-named temp file in the cache directory
    /// and is renamed into place, so readers never observe a partial entry
    /// and same-fingerprint racers (whose payloads are byte-identical)
    /// settle by last-writer-wins. A failed write is logged and swallowed:
    /// correctness does not depend on the cache persisting anything.
    pub(crate) fn store(&self, fingerprint: &Fingerprint, text: &str) {
        if let Err(e) = self.store_inner(fingerprint, text) {
            warn!("failed to persist cache entry {}: {e}", fingerprint);
        }
    }

    fn store_inner(&self, fingerprint: &Fingerprint, text: &str) -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.persist(self.entry_path(fingerprint))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Resolve `bytes` to their extracted text, extracting on a miss.
    ///
    /// The single entry point consumers use. On a hit, `extract` is not
    /// invoked at all. On a miss, its result is stored and returned; on
    /// extraction failure the error propagates and *nothing* is cached, so
    /// a later call with the same bytes retries extraction instead of
    /// replaying a cached failure.
    pub async fn resolve<F, Fut>(&self, bytes: &[u8], extract: F) -> Result<String, LecternError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, LecternError>>,
    {
        let fingerprint = Fingerprint::of(bytes);

        if let Some(text) = self.lookup(&fingerprint) {
            info!("cache hit for {}", fingerprint);
            return Ok(text);
        }

        info!("cache miss for {}, extracting", fingerprint);
        let text = extract().await?;
        self.store(&fingerprint, &text);
        Ok(text)
    }

    /// Remove every entry whose age exceeds `max_age`; returns the count
    /// removed.
    ///
    /// Age is measured from the entry file's mtime. Only filenames that
    /// parse as fingerprints are considered — in-flight temp files and
    /// anything else living in the directory are left alone. Not invoked on
    /// the request path; run it periodically or on demand.
    pub async fn expire(&self, max_age: Duration) -> Result<usize, LecternError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || expire_blocking(&dir, max_age))
            .await
            .map_err(|e| LecternError::Internal(format!("expire task panicked: {e}")))?
    }
}

fn expire_blocking(dir: &Path, max_age: Duration) -> Result<usize, LecternError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LecternError::CacheIo {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable directory entry during expiry: {e}");
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if Fingerprint::from_hex(name).is_none() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        if age > max_age {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("removed expired cache entry {name} (age {age:?})");
                    removed += 1;
                }
                Err(e) => warn!("failed to remove expired cache entry {name}: {e}"),
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn cache_in(dir: &tempfile::TempDir) -> ContentCache {
        ContentCache::open(dir.path()).unwrap()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::of(b"lecture slides week 1");
        let b = Fingerprint::of(b"lecture slides week 1");
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn fingerprint_differs_across_a_corpus() {
        let corpus: &[&[u8]] = &[
            b"",
            b"a",
            b"b",
            b"ab",
            b"ba",
            b"lecture slides week 1",
            b"lecture slides week 1 ", // one trailing byte
            b"\x00\x01\x02",
        ];
        let mut seen = std::collections::HashSet::new();
        for bytes in corpus {
            assert!(seen.insert(Fingerprint::of(bytes).to_hex()), "collision for {bytes:?}");
        }
    }

    #[test]
    fn fingerprint_matches_known_sha256_vector() {
        // SHA-256 of the empty input.
        assert_eq!(
            Fingerprint::of(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_hex_round_trips() {
        let fp = Fingerprint::of(b"round trip");
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()), Some(fp));
        assert_eq!(Fingerprint::from_hex("not-hex"), None);
        assert_eq!(Fingerprint::from_hex("abcd"), None); // too short
        let uppercase = fp.to_hex().to_uppercase();
        assert_eq!(Fingerprint::from_hex(&uppercase), None); // entries are lowercase
    }

    #[tokio::test]
    async fn resolve_extracts_once_for_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let text = cache
                .resolve(b"two-page document", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Page1\nPage2".to_string())
                })
                .await
                .unwrap();
            assert_eq!(text, "Page1\nPage2");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "second resolve must hit the cache");
    }

    #[tokio::test]
    async fn failed_extraction_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let calls = Arc::clone(&calls);
            cache
                .resolve(b"flaky document", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LecternError::ExtractionFailed {
                        label: "flaky.pdf".into(),
                        detail: "ocr engine crashed".into(),
                    })
                })
                .await
        };
        assert!(first.is_err());

        // Extraction now succeeds and must actually run (no cached failure).
        let second = {
            let calls = Arc::clone(&calls);
            cache
                .resolve(b"flaky document", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("recovered".to_string())
                })
                .await
                .unwrap()
        };
        assert_eq!(second, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // And the success is now cached.
        let third = cache
            .resolve(b"flaky document", || async {
                panic!("must not extract after a cached success")
            })
            .await
            .unwrap();
        assert_eq!(third, "recovered");
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        let fp = Fingerprint::of(b"document");
        std::fs::write(dir.path().join(fp.to_hex()), [0xFFu8, 0xFE, 0x00]).unwrap();
        assert_eq!(cache.lookup(&fp), None);
    }

    #[tokio::test]
    async fn expire_removes_only_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        let old = Fingerprint::of(b"old document");
        cache.store(&old, "old text");
        tokio::time::sleep(Duration::from_millis(400)).await;

        let fresh = Fingerprint::of(b"fresh document");
        cache.store(&fresh, "fresh text");

        let removed = cache.expire(Duration::from_millis(200)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.lookup(&old), None, "expired entry must not resurrect");
        assert_eq!(cache.lookup(&fresh).as_deref(), Some("fresh text"));

        // A generous threshold removes nothing further.
        assert_eq!(cache.expire(Duration::from_secs(3600)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expire_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);
        std::fs::write(dir.path().join("README.txt"), "not a cache entry").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let removed = cache.expire(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("README.txt").exists());
    }

    #[tokio::test]
    async fn concurrent_resolves_for_distinct_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir);

        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .resolve(&[i], move || async move { Ok(format!("text-{i}")) })
                        .await
                        .unwrap()
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), format!("text-{i}"));
        }
    }
}
