// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `gcells`
//! subcommands are contained in modules.
//!
//! Only 3 things should be public in this module: `Gcells`, `Gcells::run`,
//! and `GcellsError`.

mod covariances;
mod error;
mod power_spectra;
mod printers;
#[cfg(test)]
mod tests;

pub use error::GcellsError;
pub(crate) use printers::{display_warnings, InfoPrinter, Warn};

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::{config::PipelineConfig, PROGRESS_BARS};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Mode-decoupled angular power spectra and Gaussian covariances of galaxy
clustering from HEALPix survey maps"#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Gcells {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that the configuration and inputs were correctly ingested
    /// and print out high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "cells")]
    #[clap(about = "Compute the power spectra of every pairing of tomographic bins, field by field.")]
    PowerSpectra(power_spectra::PowerSpectraArgs),

    #[clap(alias = "covariance")]
    #[clap(
        about = "Compute the Gaussian covariances between every pair of bin pairings, reusing the results of power-spectra."
    )]
    Covariances(covariances::CovariancesArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::PowerSpectra(_) => "power-spectra",
            Command::Covariances(_) => "covariances",
        }
    }

    fn config(&self) -> &PathBuf {
        match self {
            Command::PowerSpectra(args) => &args.config,
            Command::Covariances(args) => &args.config,
        }
    }

    fn run(self, config: &PipelineConfig, dry_run: bool) -> Result<(), GcellsError> {
        match self {
            Command::PowerSpectra(args) => args.run(config, dry_run),
            Command::Covariances(args) => args.run(config, dry_run),
        }
    }
}

impl Gcells {
    pub fn run(self) -> Result<(), GcellsError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
        } = self.global_opts;
        setup_logging(verbosity).map_err(|e| GcellsError::Generic(e.to_string()))?;
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of gcells and its build-time information.
        let sub_command = self.command.name();
        info!("gcells {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let config = PipelineConfig::read(self.command.config())?;
        let mut printer = InfoPrinter::new("Configuration".into());
        printer.push_line(format!("File: {}", self.command.config().display()).into());
        printer.push_block(vec![
            format!("Output directory: {}", config.global.paths.out.display()).into(),
            format!("Fields: {}", config.subfields().join(", ")).into(),
            format!("nside: {}", config.global.nside_hi).into(),
        ]);
        printer.display();

        self.command.run(&config, dry_run)?;

        info!("gcells {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
