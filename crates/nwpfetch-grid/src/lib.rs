//! Gridded forecast files: netCDF classic datasets and the fields derived
//! from converted ECMWF output.
//!
//! - [`netcdf`] - CDF-1/CDF-2 datasets held in memory, saved atomically
//! - [`derive`] - humidity from temperature/dew point, radiation fluxes
//!   from accumulations

pub mod derive;
mod error;
pub mod netcdf;

pub use error::{Error, Result};
pub use netcdf::{DataType, Dataset, Version};
