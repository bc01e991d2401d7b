use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source:  std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Command {
        program: String,
        status:  std::process::ExitStatus,
        stderr:  String,
    },

    #[error("'{path}' is not a valid converted file after {attempts} attempt(s)")]
    InvalidOutput { path: PathBuf, attempts: u32 },

    #[error("'{0}' does not name a GRIB2 file")]
    NotGrib(PathBuf),

    #[error("no forecast run found at or before {0}")]
    NoRun(chrono::NaiveDate),

    #[error(transparent)]
    Retrieve(#[from] nwpfetch_fetch::RetrieveError),

    #[error(transparent)]
    Grid(#[from] nwpfetch_grid::Error),

    #[error(transparent)]
    Fs(#[from] nwpfetch_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
