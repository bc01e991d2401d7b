use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use nwpfetch_fs::StagedFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::core::check_min_size;
use crate::data::{AttemptRecord, FetchJob, FetchOutcome, FetchRequest, RetryPolicy};
use crate::effects::retriever::Retriever;
use crate::error::{AttemptFailure, RetrieveError};

/// Drives a [`Retriever`] under a [`RetryPolicy`].
///
/// The fetcher owns its client explicitly; there is no process-wide session.
/// Fetches for the same destination must not run concurrently, the caller
/// sequences them.
pub struct Fetcher<R: Retriever> {
    retriever: Arc<R>,
    policy:    RetryPolicy,
}

impl<R: Retriever> Fetcher<R> {
    /// Create a fetcher with the default policy.
    pub fn new(retriever: R) -> Self {
        Self {
            retriever: Arc::new(retriever),
            policy:    RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }

    /// Fetch `request` into `destination` using the configured policy.
    pub async fn fetch(&self, request: &FetchRequest, destination: &Path) -> FetchOutcome {
        self.fetch_with(request, destination, &self.policy).await
    }

    /// Fetch `request` into `destination` under an explicit policy.
    ///
    /// Every attempt starts by removing a stale `<destination>.tmp`. The
    /// destination itself is only touched by the final rename.
    #[instrument(
        skip_all,
        fields(request = %request, destination = %destination.display())
    )]
    pub async fn fetch_with(
        &self,
        request: &FetchRequest,
        destination: &Path,
        policy: &RetryPolicy,
    ) -> FetchOutcome {
        let max_attempts = policy.effective_attempts();
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.attempt(request, destination, policy).await;
            let elapsed = started.elapsed();

            match result {
                Ok((path, size)) => {
                    info!(
                        attempt,
                        size,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "fetch committed"
                    );
                    attempts.push(AttemptRecord {
                        attempt,
                        elapsed,
                        result: Ok(size),
                    });
                    return FetchOutcome::Success { path, attempts };
                }
                Err(failure) => {
                    warn!(
                        attempt,
                        max_attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        error = %failure,
                        "fetch attempt failed"
                    );
                    attempts.push(AttemptRecord {
                        attempt,
                        elapsed,
                        result: Err(failure.clone()),
                    });

                    if attempt >= max_attempts {
                        return FetchOutcome::Failure {
                            reason: failure,
                            attempts,
                        };
                    }

                    let delay = policy.delay_after(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetch each job in order, one at a time, continuing past failures.
    ///
    /// `on_done` observes every outcome as soon as it is known.
    pub async fn fetch_all<F>(&self, jobs: &[FetchJob], mut on_done: F) -> Vec<FetchOutcome>
    where
        F: FnMut(&FetchJob, &FetchOutcome),
    {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let outcome = self.fetch(&job.request, &job.destination).await;
            on_done(job, &outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn attempt(
        &self,
        request: &FetchRequest,
        destination: &Path,
        policy: &RetryPolicy,
    ) -> Result<(PathBuf, u64), AttemptFailure> {
        let staged = StagedFile::new(destination)?;
        if staged.clear()? {
            debug!(path = %staged.path().display(), "removed stale staging file");
        }

        let cancel = CancellationToken::new();
        let task = {
            let retriever = Arc::clone(&self.retriever);
            let request = request.clone();
            let target = staged.path().to_path_buf();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RetrieveError::Cancelled),
                    result = retriever.retrieve(&request, &target, &cancel) => result,
                }
            })
        };

        match tokio::time::timeout(policy.attempt_timeout, task).await {
            Err(_) => {
                // The task is detached rather than awaited. Whatever it still
                // writes to the staging path is removed here, on drop, or by
                // the next attempt's cleanup.
                cancel.cancel();
                if let Err(e) = staged.clear() {
                    warn!(
                        path = %staged.path().display(),
                        error = %e,
                        "could not remove staging file after timeout"
                    );
                }
                Err(AttemptFailure::Timeout(policy.attempt_timeout))
            }
            Ok(Err(join_error)) => Err(AttemptFailure::Transport(format!(
                "retrieval task failed: {join_error}"
            ))),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Ok(Ok(()))) => {
                let size = check_min_size(staged.size()?, policy.min_size)?;
                let path = staged.commit()?;
                Ok((path, size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    /// Writes `sizes[n]` bytes on call `n`, repeating the last entry.
    struct SizedWrites {
        sizes: Vec<usize>,
        calls: AtomicU32,
    }

    impl Retriever for SizedWrites {
        async fn retrieve(
            &self,
            _request: &FetchRequest,
            target: &Path,
            _cancel: &CancellationToken,
        ) -> Result<(), RetrieveError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let size = self.sizes[call.min(self.sizes.len() - 1)];
            tokio::fs::write(target, vec![b'x'; size]).await?;
            Ok(())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(3)
            .attempt_timeout(Duration::from_secs(5))
            .backoff_unit(Duration::from_millis(1))
            .backoff_cap(Duration::from_millis(4))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.grib2");
        let fetcher = Fetcher::new(SizedWrites {
            sizes: vec![4096],
            calls: AtomicU32::new(0),
        })
        .with_policy(fast_policy());

        let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

        assert_eq!(outcome.path(), Some(dest.as_path()));
        assert_eq!(outcome.attempts().len(), 1);
        assert_eq!(outcome.attempts()[0].result, Ok(4096));
        assert!(!dir.path().join("out.grib2.tmp").exists());
    }

    #[tokio::test]
    async fn test_undersized_results_exhaust_attempts() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.grib2");
        let fetcher = Fetcher::new(SizedWrites {
            sizes: vec![10],
            calls: AtomicU32::new(0),
        })
        .with_policy(fast_policy());

        let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

        match outcome {
            FetchOutcome::Failure { reason, attempts } => {
                assert_eq!(
                    reason,
                    AttemptFailure::Integrity {
                        actual:  10,
                        minimum: 1024,
                    }
                );
                assert_eq!(attempts.len(), 3);
                assert_eq!(
                    attempts.iter().map(|a| a.attempt).collect::<Vec<_>>(),
                    vec![1, 2, 3]
                );
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!dir.path().join("out.grib2.tmp").exists());
        assert_eq!(fetcher.retriever().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_staging_file_is_removed_first() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.grib2");
        std::fs::write(dir.path().join("out.grib2.tmp"), vec![b'y'; 8192]).unwrap();

        // the retriever reports success without writing anything; the stale
        // file must not be mistaken for its output
        struct WritesNothing;
        impl Retriever for WritesNothing {
            async fn retrieve(
                &self,
                _request: &FetchRequest,
                _target: &Path,
                _cancel: &CancellationToken,
            ) -> Result<(), RetrieveError> {
                Ok(())
            }
        }

        let outcome = Fetcher::new(WritesNothing)
            .with_policy(fast_policy().max_attempts(1))
            .fetch(&FetchRequest::new(), &dest)
            .await;

        assert!(!outcome.is_success());
        assert!(!dest.exists());
        assert!(!dir.path().join("out.grib2.tmp").exists());
    }
}
