//! Provider glue around the fetcher.
//!
//! - [`ecmwf`] - ECMWF open-data forecast runs, steps and the index/range
//!   retriever
//! - [`mercator`] - Copernicus Marine file selection and the
//!   `copernicusmarine` command driver
//! - [`convert`] - GRIB2 to netCDF conversion through `wgrib2`

pub mod convert;
pub mod ecmwf;
mod error;
pub mod mercator;

pub use error::{Error, Result};
