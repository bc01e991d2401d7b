use anyhow::Result;
use nwpfetch_fetch::{FetchOutcome, FetchRequest, Fetcher, HttpRetriever};
use tracing::{error, info};

use super::Tally;
use crate::cli::GetArg;
use crate::config::Config;

pub async fn run(arg: GetArg, config: &Config) -> Result<Tally> {
    let fetcher = Fetcher::new(HttpRetriever::new()?).with_policy(config.fetch.policy());
    let request = FetchRequest::url(&arg.url);

    let mut tally = Tally::default();
    match fetcher.fetch(&request, &arg.destination).await {
        FetchOutcome::Success { path, attempts } => {
            info!(path = %path.display(), attempts = attempts.len(), "fetched");
            tally.record(true);
        }
        FetchOutcome::Failure { reason, attempts } => {
            error!(url = %arg.url, attempts = attempts.len(), %reason, "fetch failed");
            tally.record(false);
        }
    }
    Ok(tally)
}
