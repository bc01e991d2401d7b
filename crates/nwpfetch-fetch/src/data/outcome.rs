use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AttemptFailure;

/// What happened during one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Wall-clock time from staging cleanup to commit or failure.
    pub elapsed: Duration,
    /// Committed size in bytes, or why the attempt failed.
    pub result:  Result<u64, AttemptFailure>,
}

impl AttemptRecord {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure(&self) -> Option<&AttemptFailure> {
        self.result.as_ref().err()
    }
}

/// Final result of a fetch. Failures are values, never panics or errors
/// unwinding past the fetch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success {
        path:     PathBuf,
        attempts: Vec<AttemptRecord>,
    },
    Failure {
        reason:   AttemptFailure,
        attempts: Vec<AttemptRecord>,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            FetchOutcome::Success { attempts, .. } | FetchOutcome::Failure { attempts, .. } => {
                attempts
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Success { path, .. } => Some(path),
            FetchOutcome::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attempt: u32, result: Result<u64, AttemptFailure>) -> AttemptRecord {
        AttemptRecord {
            attempt,
            elapsed: Duration::from_millis(5),
            result,
        }
    }

    #[test]
    fn test_success_accessors() {
        let outcome = FetchOutcome::Success {
            path:     PathBuf::from("/data/a.grib2"),
            attempts: vec![record(1, Ok(2048))],
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.path(), Some(Path::new("/data/a.grib2")));
        assert_eq!(outcome.attempts().len(), 1);
        assert!(outcome.attempts()[0].is_success());
    }

    #[test]
    fn test_failure_accessors() {
        let reason = AttemptFailure::Timeout(Duration::from_secs(1));
        let outcome = FetchOutcome::Failure {
            reason:   reason.clone(),
            attempts: vec![record(1, Err(reason.clone())), record(2, Err(reason.clone()))],
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.path(), None);
        assert_eq!(outcome.attempts().len(), 2);
        assert_eq!(outcome.attempts()[1].failure(), Some(&reason));
    }
}
