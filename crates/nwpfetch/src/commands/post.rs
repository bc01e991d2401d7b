use std::path::PathBuf;

use nwpfetch_grid::derive::{self, FluxOutcome};
use nwpfetch_source::convert::Converter;
use tracing::{debug, info, warn};

use super::Tally;
use crate::progress::job_bar;

/// Convert each GRIB2 file, continuing past failures.
pub async fn convert_files(converter: &Converter, files: &[PathBuf]) -> Tally {
    let pb = job_bar(files.len(), "converting");
    let mut tally = Tally::default();
    for file in files {
        let result = converter.convert(file).await;
        if let Err(e) = &result {
            pb.suspend(|| warn!(file = %file.display(), error = %e, "conversion failed"));
        }
        tally.record(result.is_ok());
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(ok = tally.ok, failed = tally.failed, "conversion done");
    tally
}

/// Add humidity to every file, then turn accumulated radiation into
/// fluxes, latest step first so each step still sees its predecessor's
/// accumulation.
pub async fn derive_files(files: &[PathBuf]) -> Tally {
    let pb = job_bar(files.len() * 2, "deriving");
    let mut tally = Tally::default();

    for file in files {
        let path = file.clone();
        let result = tokio::task::spawn_blocking(move || derive::add_humidity_file(&path)).await;
        let ok = match result {
            Ok(Ok(added)) => {
                debug!(file = %file.display(), ?added, "humidity");
                true
            }
            Ok(Err(e)) => {
                pb.suspend(|| warn!(file = %file.display(), error = %e, "humidity failed"));
                false
            }
            Err(e) => {
                pb.suspend(|| warn!(file = %file.display(), error = %e, "humidity task failed"));
                false
            }
        };
        tally.record(ok);
        pb.inc(1);
    }

    let mut ordered = files.to_vec();
    derive::latest_first(&mut ordered);
    for file in ordered {
        let path = file.clone();
        let result =
            tokio::task::spawn_blocking(move || derive::convert_radiation_file(&path)).await;
        let ok = match result {
            Ok(Ok(FluxOutcome::PreviousMissing(prev))) => {
                pb.suspend(|| {
                    warn!(file = %file.display(), previous = %prev.display(), "previous step missing")
                });
                true
            }
            Ok(Ok(outcome)) => {
                debug!(file = %file.display(), ?outcome, "radiation");
                true
            }
            Ok(Err(e)) => {
                pb.suspend(|| warn!(file = %file.display(), error = %e, "radiation failed"));
                false
            }
            Err(e) => {
                pb.suspend(|| warn!(file = %file.display(), error = %e, "radiation task failed"));
                false
            }
        };
        tally.record(ok);
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(ok = tally.ok, failed = tally.failed, "derivation done");
    tally
}
