//! Copernicus Marine global ocean forecasts.
//!
//! Each dataset is listed with a dry run of the `copernicusmarine` tool,
//! the listing is cut down to the forecast window, and only the remaining
//! files are downloaded.

mod runner;

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

pub use runner::{Copernicus, DEFAULT_PROGRAM, DatasetReport};

pub const DEFAULT_DATASETS: [&str; 4] = [
    "cmems_mod_glo_phy-cur_anfc_0.083deg_PT6H-i",
    "cmems_mod_glo_phy-so_anfc_0.083deg_PT6H-i",
    "cmems_mod_glo_phy-thetao_anfc_0.083deg_PT6H-i",
    "cmems_mod_glo_phy_anfc_merged-sl_PT1H-i",
];

/// Hour assigned to daily files that carry only a date.
const DAILY_FILE_HOUR: u32 = 12;

/// Valid time encoded in a product file name.
///
/// 6-hourly datasets name files `glo12_rg_6h-i_YYYYMMDD-HHh_...`; the
/// others `MOL_YYYYMMDD_...`, which are taken to be valid at 12:00.
pub fn file_time(file_name: &str, dataset_id: &str) -> Option<NaiveDateTime> {
    let parts: Vec<&str> = file_name.split('_').collect();
    if dataset_id.contains("PT6H") {
        let (date, time) = parts.get(3)?.split_once('-')?;
        let hour: u32 = time.get(..2)?.parse().ok()?;
        parse_day(date)?.and_hms_opt(hour, 0, 0)
    } else {
        parse_day(parts.get(1)?)?.and_hms_opt(DAILY_FILE_HOUR, 0, 0)
    }
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Inclusive range of valid times to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end:   NaiveDateTime,
}

impl TimeWindow {
    /// `day` 00:00 plus `start_hours`, through `days` days later.
    pub fn for_day(day: NaiveDate, start_hours: u32, days: u32) -> Self {
        let start = day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(start_hours));
        let end = start + Duration::days(i64::from(days));
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// `{root}/{YYYY-MM-DD}` of the window's first day.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(self.start.format("%Y-%m-%d").to_string())
    }
}

/// Keep the listing lines whose file falls inside `window`.
///
/// Lines are remote paths; only the last path segment is parsed. Blank
/// lines are dropped, unparsable names are logged and dropped.
pub fn filter_file_list(listing: &str, dataset_id: &str, window: &TimeWindow) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|&line| {
            let name = line.rsplit('/').next().unwrap_or(line);
            match file_time(name, dataset_id) {
                Some(time) => window.contains(time),
                None => {
                    warn!(file = name, dataset_id, "cannot read valid time from file name");
                    false
                }
            }
        })
        .map(str::to_string)
        .collect()
}
