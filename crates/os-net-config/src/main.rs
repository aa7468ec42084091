//! os-net-config - host network configuration
//!
//! Entry point for the os-net-config tool.

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use osnet_common::HostRunner;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use os_net_config::{apply, Args};

/// Exit code reported with `--detailed-exit-codes` when files changed.
const EXIT_FILES_CHANGED: u8 = 2;

/// Initializes tracing/logging subsystem
///
/// `RUST_LOG` overrides the level chosen on the command line.
fn init_logging(level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to set tracing subscriber: {e}"))
}

fn run(args: &Args) -> Result<ExitCode> {
    let opts = args.apply_options();
    info!(
        config_file = %opts.config_file.display(),
        mapping_file = %opts.mapping_file.display(),
        noop = opts.noop,
        "--- Starting os-net-config ---"
    );

    let report = apply(&opts, &HostRunner)?;

    if opts.noop {
        if let Some(config) = &report.vpp_config {
            println!("{config}");
        }
        for path in &report.changed_files {
            println!("Would update {}", path.display());
        }
    }

    if args.detailed_exit_codes && report.changed() {
        return Ok(ExitCode::from(EXIT_FILES_CHANGED));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_level()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
