//! Staged files and atomic placement primitives.
//!
//! - [`StagedFile`] - a `<destination>.tmp` sibling that only becomes visible
//!   at the destination through a single rename
//! - [`atomic_write`] - write a whole buffer through a unique temporary file

mod error;
mod primitives;
mod workflow;

pub use error::{Error, Result};
pub use primitives::{AtomicWriteOptions, atomic_write, remove_if_exists};
pub use workflow::{STAGING_SUFFIX, StagedFile};
