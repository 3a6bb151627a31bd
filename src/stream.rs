//! Streaming generation: emit text fragments as the service produces them.
//!
//! ## Why stream?
//!
//! A full study guide takes the completion service tens of seconds. The
//! streaming API lets the consumer start rendering after the first fragment
//! instead of staring at a spinner — the difference between "working" and
//! "broken" from a user's chair.
//!
//! Unlike the eager [`crate::Lectern::process`], which returns only after
//! the full text is available, [`Lectern::process_stream`] yields each
//! non-empty fragment as it arrives. The stream is lazy, finite,
//! single-pass and non-restartable; the concatenation of the yielded
//! fragments equals what `process` would have returned for the same
//! response. If the service dies mid-response, the fragments already
//! yielded remain valid and the stream ends with one
//! [`LecternError::StreamInterrupted`] item.
//!
//! Dropping the stream cancels the underlying connection; nothing is
//! persisted about the abandoned generation.

use crate::assemble::DocumentSource;
use crate::error::LecternError;
use crate::generate::Lectern;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed, single-pass stream of generated text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LecternError>> + Send>>;

impl Lectern {
    /// Generate study material as a fragment stream.
    ///
    /// Phases match [`Lectern::process`] — the mode id is validated before
    /// any extraction, and assembly completes before the completion service
    /// is contacted; only the response itself is incremental.
    pub async fn process_stream(
        &self,
        use_case_id: &str,
        documents: &[DocumentSource],
    ) -> Result<FragmentStream, LecternError> {
        let mode = self.validate(use_case_id)?;
        let context = self.assemble(documents).await?;
        let request = self.build_request(mode, &context);

        info!(
            "dispatching streaming {} request ({} document(s), {} context chars)",
            mode.id(),
            documents.len(),
            context.len()
        );
        self.provider().complete_stream(&request).await
    }
}
