use std::path::Path;

use tracing::debug;

use crate::netcdf::Dataset;
use crate::{Error, Result};

pub const TEMPERATURE: &str = "TMP_2maboveground";
pub const DEW_POINT: &str = "DPT_2maboveground";
pub const SURFACE_PRESSURE: &str = "PRES_surface";
pub const RELATIVE_HUMIDITY: &str = "RH_2maboveground";
pub const SPECIFIC_HUMIDITY: &str = "SPFH_2maboveground";

const KELVIN: f64 = 273.15;

/// Magnus vapour pressure over water in hPa for a temperature in °C.
pub fn vapour_pressure(celsius: f64) -> f64 {
    6.11 * 10f64.powf(7.5 * celsius / (237.3 + celsius))
}

/// Relative humidity in percent from air and dew point temperature in K.
pub fn relative_humidity(temperature: f64, dew_point: f64) -> f64 {
    let e = vapour_pressure(dew_point - KELVIN);
    let es = vapour_pressure(temperature - KELVIN);
    (e / es * 100.0).clamp(0.0, 100.0)
}

/// Specific humidity in kg/kg from dew point (K) and pressure (Pa).
pub fn specific_humidity(dew_point: f64, pressure: f64) -> f64 {
    let e = vapour_pressure(dew_point - KELVIN);
    let p = pressure / 100.0;
    0.622 * e / (p - 0.378 * e)
}

/// Which humidity variables [`add_humidity`] created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HumidityAdded {
    pub relative: bool,
    pub specific: bool,
}

/// Add `RH_2maboveground` and `SPFH_2maboveground` to a converted
/// atmosphere dataset. Variables that already exist are left untouched.
///
/// Both take the shape, type and attributes of `TMP_2maboveground`. A
/// grid point missing in any input is written as the template's fill
/// value.
pub fn add_humidity(dataset: &mut Dataset) -> Result<HumidityAdded> {
    let mut added = HumidityAdded::default();
    let want_rh = !dataset.has_variable(RELATIVE_HUMIDITY);
    let want_q = !dataset.has_variable(SPECIFIC_HUMIDITY);
    if !want_rh && !want_q {
        return Ok(added);
    }

    let t2 = masked(dataset, TEMPERATURE)?;
    let td = masked(dataset, DEW_POINT)?;
    let sp = masked(dataset, SURFACE_PRESSURE)?;
    for (name, values) in [(DEW_POINT, &td), (SURFACE_PRESSURE, &sp)] {
        if values.len() != t2.len() {
            return Err(Error::ShapeMismatch {
                name:     name.to_string(),
                expected: t2.len(),
                actual:   values.len(),
            });
        }
    }

    let fill = dataset.fill_value(TEMPERATURE).unwrap_or(f64::NAN);
    let combine = |f: fn(f64, f64) -> f64, a: &[Option<f64>], b: &[Option<f64>]| -> Vec<f64> {
        a.iter()
            .zip(b)
            .map(|(x, y)| match (x, y) {
                (Some(x), Some(y)) => f(*x, *y),
                _ => fill,
            })
            .collect()
    };

    if want_rh {
        let values = combine(relative_humidity, &t2, &td);
        derive_from_template(dataset, RELATIVE_HUMIDITY, "Relative Humidity", "%", &values)?;
        added.relative = true;
    }
    if want_q {
        let values = combine(specific_humidity, &td, &sp);
        derive_from_template(dataset, SPECIFIC_HUMIDITY, "Specific Humidity", "kg/kg", &values)?;
        added.specific = true;
    }
    Ok(added)
}

/// [`add_humidity`] on a file, saved in place when anything was added.
pub fn add_humidity_file(path: &Path) -> Result<HumidityAdded> {
    let mut dataset = Dataset::open(path)?;
    let added = add_humidity(&mut dataset)?;
    if added.relative || added.specific {
        dataset.save(path)?;
    }
    Ok(added)
}

/// Values of `name` with fill and NaN entries replaced by `None`.
pub(crate) fn masked(dataset: &Dataset, name: &str) -> Result<Vec<Option<f64>>> {
    let fill = dataset.fill_value(name);
    Ok(dataset
        .values(name)?
        .into_iter()
        .map(|v| (!v.is_nan() && Some(v) != fill).then_some(v))
        .collect())
}

fn derive_from_template(
    dataset: &mut Dataset,
    name: &str,
    long_name: &str,
    units: &str,
    values: &[f64],
) -> Result<()> {
    debug!(variable = name, "adding derived humidity");
    dataset.add_variable_like(TEMPERATURE, name, values)?;
    dataset.remove_attribute(name, "standard_name")?;
    dataset.set_text_attribute(name, "short_name", name)?;
    dataset.set_text_attribute(name, "long_name", long_name)?;
    dataset.set_text_attribute(name, "units", units)?;
    Ok(())
}
