//! Fields computed from converted ECMWF atmosphere files.

pub mod flux;
pub mod humidity;

pub use flux::{
    FLUX_MARKER, FluxOutcome, ForecastFileName, RADIATION, convert_radiation,
    convert_radiation_file, latest_first, previous_step,
};
pub use humidity::{
    HumidityAdded, add_humidity, add_humidity_file, relative_humidity, specific_humidity,
    vapour_pressure,
};
