//! Timeout-bounded, retrying downloads with atomic placement.
//!
//! # Architecture
//!
//! - [`data`] - requests, retry policy and outcome records
//! - [`core`] - pure backoff and integrity rules
//! - [`effects`] - the retriever seam and the [`Fetcher`] driving it
//!
//! Each attempt runs the retriever as its own task, bounded by the policy's
//! attempt timeout. The result lands in `<destination>.tmp` and reaches the
//! destination only through a rename after the size check passes, so the
//! destination never holds a partial file.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use core::{backoff_delay, check_min_size};
pub use data::{AttemptRecord, FetchJob, FetchOutcome, FetchRequest, ParamValue, RetryPolicy};
pub use effects::{Blocking, BlockingRetriever, Fetcher, Retriever};
pub use error::{AttemptFailure, RetrieveError};

#[cfg(feature = "reqwest")]
pub use effects::{HttpRetriever, WriteMode, download_to};

pub use tokio_util::sync::CancellationToken;
