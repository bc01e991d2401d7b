use anyhow::Result;
use chrono::Local;
use nwpfetch_source::mercator::{Copernicus, TimeWindow};
use tracing::{info, warn};

use super::Tally;
use crate::cli::MercatorArg;
use crate::config::Config;
use crate::progress::job_bar;

pub async fn run(arg: MercatorArg, config: &Config) -> Result<Tally> {
    let cfg = &config.mercator;
    let day = arg.date.unwrap_or_else(|| Local::now().date_naive());
    let window = TimeWindow::for_day(day, cfg.window_start_hours, cfg.window_days);
    let output_dir = window.output_dir(&cfg.output_root);
    let runner = Copernicus::new(&cfg.program, std::env::temp_dir().join("nwpfetch"));
    info!(
        %day,
        start = %window.start,
        end = %window.end,
        output = %output_dir.display(),
        "Copernicus Marine window"
    );

    let pb = job_bar(cfg.datasets.len(), "datasets");
    let mut tally = Tally::default();
    for dataset_id in &cfg.datasets {
        match runner.download(dataset_id, day, &window, &output_dir).await {
            Ok(report) => {
                pb.suspend(|| {
                    info!(
                        dataset_id = %dataset_id,
                        listed = report.listed,
                        selected = report.selected,
                        downloaded = report.downloaded,
                        "dataset done"
                    )
                });
                tally.record(true);
            }
            Err(e) => {
                pb.suspend(|| warn!(dataset_id = %dataset_id, error = %e, "dataset failed"));
                tally.record(false);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(tally)
}
