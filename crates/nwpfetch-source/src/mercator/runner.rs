use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nwpfetch_fs::{AtomicWriteOptions, atomic_write, remove_if_exists};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{TimeWindow, filter_file_list};
use crate::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "copernicusmarine";

/// What happened to one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dataset_id: String,
    pub listed:     usize,
    pub selected:   usize,
    pub downloaded: bool,
}

/// Driver for the `copernicusmarine` command line tool.
///
/// Credentials come from the tool's own configuration or environment.
#[derive(Debug, Clone)]
pub struct Copernicus {
    program:  PathBuf,
    work_dir: PathBuf,
}

impl Copernicus {
    /// `work_dir` holds the temporary file lists.
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program:  program.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn list_path(&self, dataset_id: &str) -> PathBuf {
        self.work_dir.join(format!("{dataset_id}.txt"))
    }

    /// List the files of `dataset_id` published on `day`, keep those inside
    /// `window`, and download them flat into `output_dir`.
    ///
    /// The temporary file list is removed whatever the outcome.
    #[instrument(skip(self, window, output_dir))]
    pub async fn download(
        &self,
        dataset_id: &str,
        day: NaiveDate,
        window: &TimeWindow,
        output_dir: &Path,
    ) -> Result<DatasetReport> {
        let list = self.list_path(dataset_id);
        if remove_if_exists(&list)? {
            debug!(path = %list.display(), "removed stale file list");
        }

        let result = self.list_and_fetch(dataset_id, day, window, output_dir, &list).await;

        match remove_if_exists(&list) {
            Ok(true) => debug!(path = %list.display(), "removed file list"),
            Ok(false) => {}
            Err(e) => warn!(path = %list.display(), error = %e, "could not remove file list"),
        }
        result
    }

    async fn list_and_fetch(
        &self,
        dataset_id: &str,
        day: NaiveDate,
        window: &TimeWindow,
        output_dir: &Path,
        list: &Path,
    ) -> Result<DatasetReport> {
        let list_name = list
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from(format!("{dataset_id}.txt")));
        tokio::fs::create_dir_all(&self.work_dir).await?;

        self.run(vec![
            "get".into(),
            "--dataset-id".into(),
            dataset_id.into(),
            "--filter".into(),
            format!("*{}*", day.format("%Y%m%d")).into(),
            "--dry-run".into(),
            "--output-directory".into(),
            self.work_dir.clone().into(),
            "--create-file-list".into(),
            list_name,
        ])
        .await?;

        let listing = tokio::fs::read_to_string(list).await?;
        let listed = listing.lines().filter(|l| !l.trim().is_empty()).count();
        let selected = filter_file_list(&listing, dataset_id, window);
        atomic_write(list, selected.join("\n").as_bytes(), AtomicWriteOptions::new())?;

        let mut report = DatasetReport {
            dataset_id: dataset_id.to_string(),
            listed,
            selected: selected.len(),
            downloaded: false,
        };
        if selected.is_empty() {
            info!(listed, "no files inside the window, skipping download");
            return Ok(report);
        }

        tokio::fs::create_dir_all(output_dir).await?;
        self.run(vec![
            "get".into(),
            "--dataset-id".into(),
            dataset_id.into(),
            "--file-list".into(),
            list.into(),
            "--output-directory".into(),
            output_dir.into(),
            "--no-directories".into(),
        ])
        .await?;

        info!(listed, selected = report.selected, "dataset downloaded");
        report.downloaded = true;
        Ok(report)
    }

    async fn run(&self, args: Vec<OsString>) -> Result<()> {
        let program = self.program.display().to_string();
        debug!(%program, ?args, "running");
        let output = Command::new(&self.program)
            .args(&args)
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
        Ok(())
    }
}
