use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HDF5-based netCDF-4 files are not supported")]
    Hdf5Unsupported,

    #[error("not a netCDF classic file (magic {0:02x?})")]
    BadMagic([u8; 4]),

    #[error("unsupported netCDF format version {0}")]
    UnsupportedVersion(u8),

    #[error("failed to open '{path}': {source}")]
    Open {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("netCDF error: {0}")]
    Netcdf(String),

    #[error("variable '{0}' is not numeric")]
    NotNumeric(String),

    #[error("variable '{name}' expects {expected} values, got {actual}")]
    ShapeMismatch {
        name:     String,
        expected: usize,
        actual:   usize,
    },

    #[error("variable '{0}' already exists")]
    VariableExists(String),

    #[error("variable '{0}' not found")]
    MissingVariable(String),

    #[error(transparent)]
    Fs(#[from] nwpfetch_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
