//! GRIB2 to netCDF conversion with `wgrib2`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nwpfetch_fetch::backoff_delay;
use nwpfetch_grid::Dataset;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::{Error, Result};

pub const DEFAULT_WGRIB2: &str = "wgrib2";

/// Dimensions every converted file must have.
pub const REQUIRED_DIMENSIONS: [&str; 3] = ["latitude", "longitude", "time"];

/// Variable renames applied to converted atmosphere files.
pub const ATMOSPHERE_RENAMES: [(&str, &str); 2] = [
    ("PRES_meansealevel", "PRMSL_meansealevel"),
    ("TPRATE_surface", "PRATE_surface"),
];

/// Path of the netCDF file produced for `grib`.
pub fn netcdf_path(grib: &Path) -> Result<PathBuf> {
    match grib.extension().and_then(|e| e.to_str()) {
        Some("grib2") => Ok(grib.with_extension("nc")),
        _ => Err(Error::NotGrib(grib.to_path_buf())),
    }
}

/// Atmosphere files carry the `atoms` tag in their name.
pub fn is_atmosphere(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("atoms"))
}

/// Apply [`ATMOSPHERE_RENAMES`]; returns the new names that were applied.
pub fn apply_renames(dataset: &mut Dataset) -> Result<Vec<&'static str>> {
    let mut renamed = Vec::new();
    for (from, to) in ATMOSPHERE_RENAMES {
        if dataset.rename_variable(from, to)? {
            renamed.push(to);
        }
    }
    Ok(renamed)
}

/// Runs `wgrib2 <in> -netcdf <out>` and checks the result, retrying a
/// bounded number of times.
#[derive(Debug, Clone)]
pub struct Converter {
    wgrib2:       PathBuf,
    max_attempts: u32,
    backoff_unit: Duration,
    backoff_cap:  Duration,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(DEFAULT_WGRIB2)
    }
}

impl Converter {
    pub fn new(wgrib2: impl Into<PathBuf>) -> Self {
        Self {
            wgrib2:       wgrib2.into(),
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            backoff_cap:  Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn backoff(mut self, unit: Duration, cap: Duration) -> Self {
        self.backoff_unit = unit;
        self.backoff_cap = cap;
        self
    }

    /// Convert `grib` next to itself and return the netCDF path.
    ///
    /// Atmosphere files get their variables renamed. The GRIB2 source is
    /// removed once the output is valid.
    #[instrument(skip(self, grib), fields(file = %grib.display()))]
    pub async fn convert(&self, grib: &Path) -> Result<PathBuf> {
        let nc = netcdf_path(grib)?;
        let attempts = self.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.attempt(grib, &nc).await {
                Ok(true) => {
                    nwpfetch_fs::remove_if_exists(grib)?;
                    info!(attempt, output = %nc.display(), "converted");
                    return Ok(nc);
                }
                Ok(false) => warn!(attempt, attempts, "converted file failed validation"),
                Err(e) => warn!(attempt, attempts, error = %e, "conversion failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(backoff_delay(attempt, self.backoff_unit, self.backoff_cap))
                    .await;
            }
        }

        Err(Error::InvalidOutput {
            path: nc,
            attempts,
        })
    }

    async fn attempt(&self, grib: &Path, nc: &Path) -> Result<bool> {
        let program = self.wgrib2.display().to_string();
        let output = Command::new(&self.wgrib2)
            .arg(grib)
            .arg("-netcdf")
            .arg(nc)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Error::Command {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let nc = nc.to_path_buf();
        let atmosphere = is_atmosphere(grib);
        tokio::task::spawn_blocking(move || finish(&nc, atmosphere))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

/// Validate a freshly converted file and apply the renames in place.
fn finish(nc: &Path, atmosphere: bool) -> Result<bool> {
    let mut dataset = match Dataset::open(nc) {
        Ok(dataset) => dataset,
        Err(e) => {
            debug!(error = %e, "unreadable output");
            return Ok(false);
        }
    };
    if !dataset.has_dimensions(&REQUIRED_DIMENSIONS) {
        return Ok(false);
    }
    if atmosphere {
        let renamed = apply_renames(&mut dataset)?;
        if !renamed.is_empty() {
            dataset.save(nc)?;
            debug!(?renamed, "renamed variables");
        }
    }
    Ok(true)
}
