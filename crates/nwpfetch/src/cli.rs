use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "nwpfetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Configuration file (default: ./nwpfetch.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "e", name = "ecmwf", about = "Download, convert and derive an ECMWF run")]
    Ecmwf(EcmwfArg),
    #[command(alias = "m", name = "mercator", about = "Download Copernicus Marine forecasts")]
    Mercator(MercatorArg),
    #[command(name = "get", about = "Fetch one URL through the retrying fetcher")]
    Get(GetArg),
    #[command(name = "convert", about = "Convert GRIB2 files to netCDF with wgrib2")]
    Convert(FilesArg),
    #[command(name = "derive", about = "Add humidity and radiation fluxes to atmosphere files")]
    Derive(FilesArg),
}

#[derive(Clone, Debug, Args)]
pub struct EcmwfArg {
    /// Run date; the latest published 00z run when omitted
    #[arg(long)]
    pub date:          Option<NaiveDate>,
    /// Cycle hour of the run
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..24))]
    pub cycle:         u32,
    #[arg(long)]
    pub skip_download: bool,
    #[arg(long)]
    pub skip_convert:  bool,
    #[arg(long)]
    pub skip_derive:   bool,
}

#[derive(Clone, Debug, Args)]
pub struct MercatorArg {
    /// Forecast day (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Clone, Debug, Args)]
pub struct GetArg {
    pub url:         String,
    pub destination: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct FilesArg {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
