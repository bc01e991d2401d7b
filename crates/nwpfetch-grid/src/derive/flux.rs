use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::humidity::masked;
use crate::netcdf::Dataset;
use crate::{Error, Result};

/// Accumulated radiation fields converted to mean fluxes.
pub const RADIATION: [&str; 2] = ["DLWRF_surface", "DSWRF_surface"];

/// Set on a converted variable; holds the accumulation interval in hours.
pub const FLUX_MARKER: &str = "nwpfetch_flux_interval_hours";

/// Forecast hour of the step preceding `hour`.
///
/// Steps are 3-hourly up to 144 h and 6-hourly after. Hour 0 has none.
pub fn previous_step(hour: u32) -> Option<u32> {
    match hour {
        0 => None,
        h if h > 144 => Some(h.saturating_sub(6)),
        h => Some(h.saturating_sub(3)),
    }
}

/// A file name of the form `ecmwf.{tag}.{run}.f{hhh}h.{resol}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastFileName {
    pub tag:        String,
    pub run:        String,
    pub hour:       u32,
    pub resolution: String,
    pub extension:  String,
}

impl ForecastFileName {
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        let [prefix, tag, run, step, resolution, extension] = parts.as_slice() else {
            return None;
        };
        if *prefix != "ecmwf" {
            return None;
        }
        let hour = step
            .strip_prefix('f')
            .and_then(|s| s.strip_suffix('h'))
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))?
            .parse()
            .ok()?;
        Some(Self {
            tag: tag.to_string(),
            run: run.to_string(),
            hour,
            resolution: resolution.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()?.to_str().and_then(Self::parse)
    }

    #[must_use]
    pub fn with_hour(&self, hour: u32) -> Self {
        Self {
            hour,
            ..self.clone()
        }
    }
}

impl fmt::Display for ForecastFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ecmwf.{}.{}.f{:03}h.{}.{}",
            self.tag, self.run, self.hour, self.resolution, self.extension
        )
    }
}

/// Replace accumulated radiation in `current` by the mean flux over the
/// `interval_hours` since `previous`.
///
/// Variables missing from either dataset, already converted in `current`,
/// or no longer accumulations in `previous` are skipped. Returns the names
/// of the converted variables.
pub fn convert_radiation(
    current: &mut Dataset,
    previous: &Dataset,
    interval_hours: u32,
) -> Result<Vec<String>> {
    let seconds = f64::from(interval_hours) * 3600.0;
    let mut converted = Vec::new();

    for name in RADIATION {
        if !current.has_variable(name) || !previous.has_variable(name) {
            continue;
        }
        if current.has_attribute(name, FLUX_MARKER) {
            debug!(variable = name, "already a flux");
            continue;
        }
        if previous.has_attribute(name, FLUX_MARKER) {
            warn!(variable = name, "previous step already converted, skipping");
            continue;
        }

        let now = masked(current, name)?;
        let before = masked(previous, name)?;
        if now.len() != before.len() {
            return Err(Error::ShapeMismatch {
                name:     name.to_string(),
                expected: now.len(),
                actual:   before.len(),
            });
        }
        let fill = current.fill_value(name).unwrap_or(f64::NAN);
        let flux: Vec<f64> = now
            .iter()
            .zip(&before)
            .map(|pair| match pair {
                (Some(a), Some(b)) => (a - b) / seconds,
                _ => fill,
            })
            .collect();

        current.set_values(name, &flux)?;
        current.set_text_attribute(name, "units", "W/m^2")?;
        current.set_int_attribute(name, FLUX_MARKER, interval_hours as i32)?;
        converted.push(name.to_string());
    }

    Ok(converted)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FluxOutcome {
    Converted(Vec<String>),
    /// Hour 0 carries no accumulation.
    FirstStep,
    NotForecastFile,
    PreviousMissing(PathBuf),
}

/// Convert the radiation fields of one converted forecast file in place,
/// reading the preceding step from the same directory.
pub fn convert_radiation_file(path: &Path) -> Result<FluxOutcome> {
    let Some(name) = ForecastFileName::from_path(path) else {
        return Ok(FluxOutcome::NotForecastFile);
    };
    let Some(prev_hour) = previous_step(name.hour) else {
        return Ok(FluxOutcome::FirstStep);
    };
    let prev_path = path.with_file_name(name.with_hour(prev_hour).to_string());
    if !prev_path.exists() {
        return Ok(FluxOutcome::PreviousMissing(prev_path));
    }

    let previous = Dataset::open(&prev_path)?;
    let mut current = Dataset::open(path)?;
    let converted = convert_radiation(&mut current, &previous, name.hour - prev_hour)?;
    if !converted.is_empty() {
        current.save(path)?;
    }
    Ok(FluxOutcome::Converted(converted))
}

/// Order files so every step is converted before the step it depends on
/// is touched: latest forecast hour first. Unrecognised names go last.
pub fn latest_first(paths: &mut [PathBuf]) {
    paths.sort_by_key(|p| {
        std::cmp::Reverse(ForecastFileName::from_path(p).map(|n| (n.tag, n.run, n.hour)))
    });
}
