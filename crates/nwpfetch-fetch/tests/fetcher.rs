//! Behavioural tests for the retrying fetcher: timeouts, integrity checks,
//! backoff and the staging invariants around them.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use nwpfetch_fetch::{
    AttemptFailure, Blocking, BlockingRetriever, CancellationToken, FetchJob, FetchOutcome,
    FetchRequest, Fetcher, RetrieveError, Retriever, RetryPolicy,
};
use tempfile::tempdir;

fn staging_of(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.file_name().unwrap().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}

fn quick_policy(max_attempts: u32, timeout: Duration) -> RetryPolicy {
    RetryPolicy::default()
        .max_attempts(max_attempts)
        .attempt_timeout(timeout)
        .backoff_unit(Duration::from_millis(1))
        .backoff_cap(Duration::from_millis(5))
}

/// Never finishes on its own; only cancellation ends it.
struct Hangs {
    calls: AtomicU32,
}

impl Retriever for Hangs {
    async fn retrieve(
        &self,
        _request: &FetchRequest,
        target: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(target, b"partial").await?;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Plays back a script of results, one per call.
struct Scripted {
    script: Mutex<Vec<Result<Vec<u8>, String>>>,
}

impl Scripted {
    fn new(mut script: Vec<Result<Vec<u8>, String>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

impl Retriever for Scripted {
    async fn retrieve(
        &self,
        _request: &FetchRequest,
        target: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        let next = self.script.lock().unwrap().pop().expect("script exhausted");
        match next {
            Ok(body) => {
                tokio::fs::write(target, body).await?;
                Ok(())
            }
            Err(message) => Err(RetrieveError::Network(message)),
        }
    }
}

/// A blocking client that ignores cancellation and finishes late.
struct SlowBlocking {
    delay: Duration,
}

impl BlockingRetriever for SlowBlocking {
    fn retrieve_blocking(
        &self,
        _request: &FetchRequest,
        target: &Path,
        _cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        std::thread::sleep(self.delay);
        std::fs::write(target, vec![b'z'; 4096])?;
        Ok(())
    }
}

#[tokio::test]
async fn every_attempt_times_out() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("ecmwf.wave.2025040900.f003h.0p25.grib2");
    let timeout = Duration::from_millis(50);
    let fetcher = Fetcher::new(Hangs {
        calls: AtomicU32::new(0),
    })
    .with_policy(quick_policy(3, timeout));

    let started = Instant::now();
    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;
    let elapsed = started.elapsed();

    match &outcome {
        FetchOutcome::Failure { reason, attempts } => {
            assert_eq!(*reason, AttemptFailure::Timeout(timeout));
            assert_eq!(attempts.len(), 3);
            assert!(
                attempts
                    .iter()
                    .all(|a| a.result == Err(AttemptFailure::Timeout(timeout)))
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(elapsed >= timeout * 3, "elapsed {elapsed:?}");
    assert_eq!(fetcher.retriever().calls.load(Ordering::SeqCst), 3);
    assert!(!dest.exists());
    assert!(!staging_of(&dest).exists());
}

#[tokio::test]
async fn integrity_failure_then_success() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.grib2");
    let body: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    let fetcher = Fetcher::new(Scripted::new(vec![Ok(vec![1; 100]), Ok(body.clone())]))
        .with_policy(quick_policy(5, Duration::from_secs(5)).min_size(1024));

    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

    assert!(outcome.is_success());
    let attempts = outcome.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts[0].result,
        Err(AttemptFailure::Integrity {
            actual:  100,
            minimum: 1024,
        })
    );
    assert_eq!(attempts[1].result, Ok(2048));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(!staging_of(&dest).exists());
}

#[tokio::test]
async fn transport_errors_are_retried() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.grib2");
    let fetcher = Fetcher::new(Scripted::new(vec![
        Err("connection reset".into()),
        Ok(vec![7; 1500]),
    ]))
    .with_policy(quick_policy(3, Duration::from_secs(5)));

    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

    let attempts = outcome.attempts();
    assert_eq!(attempts.len(), 2);
    match attempts[0].failure() {
        Some(AttemptFailure::Transport(message)) => assert!(message.contains("connection reset")),
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(outcome.path(), Some(dest.as_path()));
}

#[tokio::test]
async fn late_completion_is_still_a_timeout() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.grib2");
    let timeout = Duration::from_millis(50);
    let fetcher = Fetcher::new(Blocking::new(SlowBlocking {
        delay: Duration::from_millis(200),
    }))
    .with_policy(quick_policy(1, timeout));

    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;
    assert_eq!(
        outcome.attempts()[0].result,
        Err(AttemptFailure::Timeout(timeout))
    );

    // let the abandoned call finish writing
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!dest.exists());
    assert!(!staging_of(&dest).exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn hung_blocking_call_does_not_delay_timeout() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.grib2");
    let fetcher = Fetcher::new(Blocking::new(SlowBlocking {
        delay: Duration::from_millis(800),
    }))
    .with_policy(quick_policy(1, Duration::from_millis(50)));

    let started = Instant::now();
    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

    assert!(!outcome.is_success());
    assert!(started.elapsed() < Duration::from_millis(600));
}

#[tokio::test]
async fn backoff_waits_between_attempts() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.grib2");
    let policy = RetryPolicy::default()
        .max_attempts(3)
        .attempt_timeout(Duration::from_secs(5))
        .backoff_unit(Duration::from_millis(20))
        .backoff_cap(Duration::from_millis(60));
    let fetcher = Fetcher::new(Scripted::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])]))
        .with_policy(policy);

    let started = Instant::now();
    let outcome = fetcher.fetch(&FetchRequest::new(), &dest).await;

    // 40ms after attempt 1, min(80ms, 60ms) after attempt 2, none after the last
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(outcome.attempts().len(), 3);
}

#[tokio::test]
async fn batch_continues_past_failures() {
    let dir = tempdir().unwrap();
    let fetcher = Fetcher::new(Scripted::new(vec![
        Ok(vec![0; 10]),
        Ok(vec![0; 2048]),
    ]))
    .with_policy(quick_policy(1, Duration::from_secs(5)));

    let jobs = vec![
        FetchJob::new(FetchRequest::new().param("step", "0"), dir.path().join("a")),
        FetchJob::new(FetchRequest::new().param("step", "3"), dir.path().join("b")),
    ];
    let mut seen = Vec::new();
    let outcomes = fetcher
        .fetch_all(&jobs, |job, outcome| {
            seen.push((job.destination.clone(), outcome.is_success()))
        })
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].is_success());
    assert!(outcomes[1].is_success());
    assert_eq!(
        seen,
        vec![(dir.path().join("a"), false), (dir.path().join("b"), true)]
    );
    assert!(!dir.path().join("a").exists());
    assert!(dir.path().join("b").exists());
}
