use anyhow::{Context, Result};
use chrono::Utc;
use nwpfetch_fetch::{FetchOutcome, Fetcher};
use nwpfetch_source::ecmwf::{ForecastRun, OpenDataRetriever, Stream};
use tracing::{info, warn};

use super::{Tally, post};
use crate::cli::EcmwfArg;
use crate::config::Config;
use crate::progress::job_bar;

pub async fn run(arg: EcmwfArg, config: &Config) -> Result<Tally> {
    let retriever = OpenDataRetriever::new(&config.ecmwf.base_url)?;
    let run = match arg.date {
        Some(date) => ForecastRun::new(date, arg.cycle),
        None => retriever
            .latest_run(Utc::now())
            .await
            .context("looking up the latest ECMWF run")?,
    };
    let layout = config.ecmwf.layout();
    info!(%run, root = %layout.output_root.display(), "ECMWF run");

    let mut tally = Tally::default();

    if !arg.skip_download {
        let jobs = layout.jobs(&run);
        let fetcher = Fetcher::new(retriever).with_policy(config.fetch.policy());
        let pb = job_bar(jobs.len(), "downloading");
        let mut downloads = Tally::default();
        fetcher
            .fetch_all(&jobs, |job, outcome| {
                if let FetchOutcome::Failure { reason, attempts } = outcome {
                    pb.suspend(|| {
                        warn!(
                            destination = %job.destination.display(),
                            attempts = attempts.len(),
                            %reason,
                            "giving up on step"
                        )
                    });
                }
                downloads.record(outcome.is_success());
                pb.inc(1);
            })
            .await;
        pb.finish_and_clear();
        info!(ok = downloads.ok, failed = downloads.failed, "downloads done");
        tally = tally.merge(downloads);
    }

    if !arg.skip_convert {
        let converter = config.converter();
        for stream in Stream::ALL {
            let files = layout.grib_files(&run, stream)?;
            tally = tally.merge(post::convert_files(&converter, &files).await);
        }
    }

    if !arg.skip_derive {
        let files = layout.netcdf_files(&run, Stream::Atmosphere)?;
        tally = tally.merge(post::derive_files(&files).await);
    }

    Ok(tally)
}
