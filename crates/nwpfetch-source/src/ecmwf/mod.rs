//! ECMWF open-data forecast runs.
//!
//! A run is identified by its date and cycle hour. Each forecast step of a
//! run is fetched twice, once per [`Stream`], into
//! `{root}/{atoms|wave}/{YYYY-MM-DD}/ecmwf.{tag}.{YYYYMMDDHH}.f{step:03}h.{resol}.grib2`.

mod retriever;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nwpfetch_fetch::{FetchJob, FetchRequest};

pub use retriever::{DEFAULT_BASE_URL, IndexEntry, OpenDataRetriever, select_ranges};

/// Last forecast hour of the 3-hourly part of the schedule.
pub const THREE_HOURLY_UNTIL: u32 = 144;
/// Last forecast hour fetched.
pub const LAST_STEP: u32 = 186;

pub const DEFAULT_RESOLUTION: &str = "0p25";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForecastRun {
    pub date:  NaiveDate,
    /// Cycle hour, 0 for the 00z run.
    pub cycle: u32,
}

impl ForecastRun {
    pub fn new(date: NaiveDate, cycle: u32) -> Self {
        Self { date, cycle }
    }

    /// The 00z run of `date`.
    pub fn daily(date: NaiveDate) -> Self {
        Self::new(date, 0)
    }

    /// `YYYYMMDDHH`, as used in file names.
    pub fn stamp(&self) -> String {
        format!("{}{:02}", self.date.format("%Y%m%d"), self.cycle)
    }

    /// `YYYY-MM-DD`, as used for output directories and requests.
    pub fn day(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for ForecastRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}z", self.day(), self.cycle)
    }
}

/// Forecast steps in hours: every 3 h up to 144 h, then every 6 h to 186 h.
pub fn steps() -> Vec<u32> {
    (0..=THREE_HOURLY_UNTIL)
        .step_by(3)
        .chain((THREE_HOURLY_UNTIL + 6..=LAST_STEP).step_by(6))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Atmosphere,
    Wave,
}

impl Stream {
    pub const ALL: [Stream; 2] = [Stream::Atmosphere, Stream::Wave];

    pub fn params(self) -> &'static [&'static str] {
        match self {
            Stream::Atmosphere => &["2t", "2d", "10v", "10u", "msl", "tprate", "ssrd", "strd", "sp"],
            Stream::Wave => &["mp2", "swh", "mwd", "mwp", "pp1d"],
        }
    }

    /// Stream name on the open-data server.
    pub fn stream(self) -> &'static str {
        match self {
            Stream::Atmosphere => "oper",
            Stream::Wave => "wave",
        }
    }

    /// Tag used in file and directory names.
    pub fn tag(self) -> &'static str {
        match self {
            Stream::Atmosphere => "atoms",
            Stream::Wave => "wave",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

/// Where and at which resolution a run is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub output_root: PathBuf,
    pub resolution:  String,
}

impl Layout {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            resolution:  DEFAULT_RESOLUTION.to_string(),
        }
    }

    #[must_use]
    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn output_dir(&self, run: &ForecastRun, stream: Stream) -> PathBuf {
        self.output_root.join(stream.tag()).join(run.day())
    }

    pub fn file_name(&self, run: &ForecastRun, stream: Stream, step: u32) -> String {
        format!(
            "ecmwf.{}.{}.f{:03}h.{}.grib2",
            stream.tag(),
            run.stamp(),
            step,
            self.resolution
        )
    }

    pub fn destination(&self, run: &ForecastRun, stream: Stream, step: u32) -> PathBuf {
        self.output_dir(run, stream)
            .join(self.file_name(run, stream, step))
    }

    pub fn request(&self, run: &ForecastRun, stream: Stream, step: u32) -> FetchRequest {
        FetchRequest::new()
            .param("date", run.day())
            .param("time", format!("{:02}", run.cycle))
            .param("type", "fc")
            .param("stream", stream.stream())
            .param("model", "ifs")
            .list("param", stream.params().iter().copied())
            .param("step", step.to_string())
            .param("resol", self.resolution.as_str())
    }

    /// Every download of a run, step by step, atmosphere before wave.
    pub fn jobs(&self, run: &ForecastRun) -> Vec<FetchJob> {
        steps()
            .into_iter()
            .flat_map(|step| {
                Stream::ALL.map(|stream| {
                    FetchJob::new(
                        self.request(run, stream, step),
                        self.destination(run, stream, step),
                    )
                })
            })
            .collect()
    }

    /// GRIB2 files of `stream` already present for `run`.
    pub fn grib_files(&self, run: &ForecastRun, stream: Stream) -> std::io::Result<Vec<PathBuf>> {
        list_with_suffix(&self.output_dir(run, stream), ".grib2")
    }

    /// Converted netCDF files of `stream` present for `run`.
    pub fn netcdf_files(&self, run: &ForecastRun, stream: Stream) -> std::io::Result<Vec<PathBuf>> {
        list_with_suffix(&self.output_dir(run, stream), ".nc")
    }
}

fn list_with_suffix(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("ecmwf.") && n.ends_with(suffix));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
