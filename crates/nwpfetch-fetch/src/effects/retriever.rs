use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use nwpfetch_fs::{StagedFile, remove_if_exists};
use tokio_util::sync::CancellationToken;

use crate::data::FetchRequest;
use crate::error::RetrieveError;

/// A client able to transfer the resource described by a request to a local
/// path.
///
/// Implementations write to `target` only. They should watch `cancel` and
/// stop early once it fires, but the fetcher does not rely on it: an
/// attempt that overruns its timeout is abandoned either way.
///
/// # Implementations
///
/// - [`HttpRetriever`](crate::HttpRetriever): plain HTTP GET of the `url` parameter
/// - [`Blocking`]: adapter for synchronous clients
pub trait Retriever: Send + Sync + 'static {
    fn retrieve(
        &self,
        request: &FetchRequest,
        target: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), RetrieveError>> + Send;
}

/// A synchronous retrieval client, such as an SDK call that blocks until the
/// file is written.
pub trait BlockingRetriever: Send + Sync + 'static {
    fn retrieve_blocking(
        &self,
        request: &FetchRequest,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RetrieveError>;
}

/// Suffix of the private file a blocking client writes before its result is
/// moved onto the retriever target.
const SCRATCH_SUFFIX: &str = ".part";

/// Runs a [`BlockingRetriever`] on the blocking thread pool.
///
/// A call that hangs keeps its pool thread busy but cannot stall the
/// runtime, so the fetcher's timeout still fires on schedule. The client
/// writes to `<target>.part`; that file is renamed onto `target` only if
/// `cancel` has not fired by the time the call returns, and removed
/// otherwise.
pub struct Blocking<B>(Arc<B>);

impl<B: BlockingRetriever> Blocking<B> {
    pub fn new(inner: B) -> Self {
        Self(Arc::new(inner))
    }

    pub fn inner(&self) -> &B {
        &self.0
    }
}

impl<B: BlockingRetriever> Retriever for Blocking<B> {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        let inner = Arc::clone(&self.0);
        let request = request.clone();
        let target = target.to_path_buf();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let scratch = StagedFile::with_suffix(&target, SCRATCH_SUFFIX)?;
            scratch.clear()?;
            inner.retrieve_blocking(&request, scratch.path(), &cancel)?;
            if cancel.is_cancelled() {
                return Err(RetrieveError::Cancelled);
            }
            scratch.commit()?;
            // cancellation may land between the check and the rename
            if cancel.is_cancelled() {
                remove_if_exists(&target)?;
                return Err(RetrieveError::Cancelled);
            }
            Ok(())
        })
        .await
        .map_err(|e| RetrieveError::Aborted(e.to_string()))?
    }
}
