//! Immutable data types for fetch operations.

pub mod outcome;
pub mod policy;
pub mod request;

pub use outcome::{AttemptRecord, FetchOutcome};
pub use policy::RetryPolicy;
pub use request::{FetchJob, FetchRequest, ParamValue};
