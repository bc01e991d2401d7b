use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, Utc};
use nwpfetch_fetch::{
    CancellationToken, FetchRequest, RetrieveError, Retriever, WriteMode, download_to,
};
use reqwest::header::RANGE;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{ForecastRun, Stream};
use crate::Error;

pub const DEFAULT_BASE_URL: &str = "https://data.ecmwf.int/forecasts";

/// One message of a GRIB2 file as listed in its `.index` companion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexEntry {
    pub param:  String,
    #[serde(rename = "_offset")]
    pub offset: u64,
    #[serde(rename = "_length")]
    pub length: u64,
}

/// Byte ranges (`start`, `length`) covering the messages of `wanted`
/// parameters, in file order, adjacent messages merged.
pub fn select_ranges(index: &str, wanted: &[&str]) -> Result<Vec<(u64, u64)>, RetrieveError> {
    let mut entries = Vec::new();
    for line in index.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry: IndexEntry = serde_json::from_str(line)
            .map_err(|e| RetrieveError::Protocol(format!("malformed index line: {e}")))?;
        if entry.length > 0 && wanted.contains(&entry.param.as_str()) {
            entries.push(entry);
        }
    }
    entries.sort_by_key(|e| e.offset);

    let mut ranges: Vec<(u64, u64)> = Vec::new();
    for entry in entries {
        match ranges.last_mut() {
            Some((start, len)) if *start + *len == entry.offset => *len += entry.length,
            _ => ranges.push((entry.offset, entry.length)),
        }
    }
    Ok(ranges)
}

/// Retriever for the ECMWF open-data server.
///
/// Downloads the `.index` of the requested step, then only the messages of
/// the requested parameters through HTTP range requests.
pub struct OpenDataRetriever {
    client:   reqwest::Client,
    base_url: String,
}

impl OpenDataRetriever {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RetrieveError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nwpfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the data file named by `request`, with the given extension.
    pub fn resource_url(
        &self,
        request: &FetchRequest,
        extension: &str,
    ) -> Result<String, RetrieveError> {
        let field = |key| required(request, key);
        let date = NaiveDate::parse_from_str(field("date")?, "%Y-%m-%d")
            .map_err(|e| RetrieveError::InvalidRequest(format!("bad 'date': {e}")))?;
        let hour: u32 = field("time")?
            .parse()
            .map_err(|_| RetrieveError::InvalidRequest("bad 'time' parameter".into()))?;
        let stream = field("stream")?;
        let step = field("step")?;
        let kind = request.text("type").unwrap_or("fc");
        let model = request.text("model").unwrap_or("ifs");
        let resol = request.text("resol").unwrap_or(super::DEFAULT_RESOLUTION);

        let ymd = date.format("%Y%m%d");
        Ok(format!(
            "{}/{ymd}/{hour:02}z/{model}/{resol}/{stream}/{ymd}{hour:02}0000-{step}h-{stream}-{kind}.{extension}",
            self.base_url
        ))
    }

    /// Whether the step-0 index of `run` is published yet.
    pub async fn run_available(&self, run: &ForecastRun) -> Result<bool, RetrieveError> {
        let request = super::Layout::new("").request(run, Stream::Atmosphere, 0);
        let url = self.resource_url(&request, "index")?;
        let response = self.client.head(&url).send().await?;
        debug!(%url, status = %response.status(), "checked run availability");
        Ok(response.status().is_success())
    }

    /// The most recent 00z run published at `now`: today's, else yesterday's.
    #[instrument(skip(self))]
    pub async fn latest_run(&self, now: DateTime<Utc>) -> crate::Result<ForecastRun> {
        let today = now.date_naive();
        let candidates = [Some(today), today.checked_sub_days(Days::new(1))];
        for date in candidates.into_iter().flatten() {
            let run = ForecastRun::daily(date);
            if self.run_available(&run).await? {
                info!(%run, "latest run");
                return Ok(run);
            }
        }
        Err(Error::NoRun(today))
    }
}

fn required<'a>(request: &'a FetchRequest, key: &str) -> Result<&'a str, RetrieveError> {
    request
        .text(key)
        .ok_or_else(|| RetrieveError::InvalidRequest(format!("missing '{key}' parameter")))
}

impl Retriever for OpenDataRetriever {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        let wanted = request.values("param");
        if wanted.is_empty() {
            return Err(RetrieveError::InvalidRequest("missing 'param' parameter".into()));
        }

        let index_url = self.resource_url(request, "index")?;
        let index = self
            .client
            .get(&index_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let ranges = select_ranges(&index, &wanted)?;
        if ranges.is_empty() {
            return Err(RetrieveError::InvalidRequest(format!(
                "none of [{}] listed in {index_url}",
                wanted.join(", ")
            )));
        }

        let data_url = self.resource_url(request, "grib2")?;
        tokio::fs::File::create(target).await?;
        for (start, length) in ranges {
            let end = start + length - 1;
            let part = self
                .client
                .get(&data_url)
                .header(RANGE, format!("bytes={start}-{end}"));
            let written = download_to(part, target, WriteMode::Append, cancel).await?;
            if written != length {
                return Err(RetrieveError::Protocol(format!(
                    "range {start}-{end} of {data_url} returned {written} bytes"
                )));
            }
        }
        debug!(%data_url, "messages stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmwf::Layout;

    const INDEX: &str = r#"
{"domain": "g", "date": "20250409", "time": "0000", "type": "fc", "stream": "oper", "step": "0", "levtype": "sfc", "param": "2t", "_offset": 0, "_length": 100}
{"domain": "g", "date": "20250409", "time": "0000", "type": "fc", "stream": "oper", "step": "0", "levtype": "sfc", "param": "2d", "_offset": 100, "_length": 50}
{"domain": "g", "date": "20250409", "time": "0000", "type": "fc", "stream": "oper", "step": "0", "levtype": "pl", "levelist": "500", "param": "gh", "_offset": 150, "_length": 70}
{"domain": "g", "date": "20250409", "time": "0000", "type": "fc", "stream": "oper", "step": "0", "levtype": "sfc", "param": "msl", "_offset": 220, "_length": 30}
"#;

    #[test]
    fn test_select_ranges_merges_adjacent_messages() {
        let ranges = select_ranges(INDEX, &["msl", "2t", "2d"]).unwrap();
        assert_eq!(ranges, vec![(0, 150), (220, 30)]);
    }

    #[test]
    fn test_select_ranges_without_matches() {
        assert!(select_ranges(INDEX, &["swh"]).unwrap().is_empty());
    }

    #[test]
    fn test_select_ranges_rejects_garbage() {
        assert!(matches!(
            select_ranges("<html>", &["2t"]),
            Err(RetrieveError::Protocol(_))
        ));
    }

    #[test]
    fn test_resource_url() {
        let retriever = OpenDataRetriever::new("https://data.ecmwf.int/forecasts/").unwrap();
        let run = ForecastRun::daily(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap());
        let request = Layout::new("/tmp").request(&run, Stream::Wave, 12);
        assert_eq!(
            retriever.resource_url(&request, "grib2").unwrap(),
            "https://data.ecmwf.int/forecasts/20250409/00z/ifs/0p25/wave/20250409000000-12h-wave-fc.grib2"
        );
        assert!(
            retriever
                .resource_url(&FetchRequest::new(), "index")
                .is_err()
        );
    }
}
