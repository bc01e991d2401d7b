pub mod staged;

pub use staged::{STAGING_SUFFIX, StagedFile};
