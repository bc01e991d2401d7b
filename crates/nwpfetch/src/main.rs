//! `nwpfetch` - download and post-process ECMWF and Copernicus Marine
//! forecasts.

mod cli;
mod commands;
mod config;
mod logging;
mod progress;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::App;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app = App::parse();
    logging::init(app.verbose);

    let config = Config::load(app.config.as_deref())?;
    commands::run(app.cmd, &config).await
}
