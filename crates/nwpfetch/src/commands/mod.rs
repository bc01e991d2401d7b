mod ecmwf;
mod get;
mod mercator;
mod post;

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::Commands;
use crate::config::Config;

/// Successes and failures of a batch that keeps going past errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok:     usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.ok += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(self, other: Tally) -> Tally {
        Tally {
            ok:     self.ok + other.ok,
            failed: self.failed + other.failed,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        if self.failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

pub async fn run(cmd: Commands, config: &Config) -> Result<ExitCode> {
    let tally = match cmd {
        Commands::Ecmwf(arg) => ecmwf::run(arg, config).await?,
        Commands::Mercator(arg) => mercator::run(arg, config).await?,
        Commands::Get(arg) => get::run(arg, config).await?,
        Commands::Convert(arg) => post::convert_files(&config.converter(), &arg.files).await,
        Commands::Derive(arg) => post::derive_files(&arg.files).await,
    };
    Ok(tally.exit_code())
}
