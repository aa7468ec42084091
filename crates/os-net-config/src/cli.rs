//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use osnet_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_MAPPING_FILE};
use tracing::Level;

use crate::apply::ApplyOptions;

/// Configure host networking from a declarative topology
#[derive(Parser, Debug)]
#[command(name = "os-net-config")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the topology document (YAML or JSON)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Path to the interface mapping document
    #[arg(short = 'm', long, default_value = DEFAULT_MAPPING_FILE)]
    pub mapping_file: PathBuf,

    /// Root directory prepended to host state and configuration files
    #[arg(short = 'r', long)]
    pub root_dir: Option<PathBuf>,

    /// Print what would change without touching the host
    #[arg(long)]
    pub noop: bool,

    /// Rename NICs to their mapped aliases (needs a mapping file)
    #[arg(long)]
    pub persist_mapping: bool,

    /// Print verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print debugging output
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Exit with 2 when files were modified
    #[arg(long)]
    pub detailed_exit_codes: bool,
}

impl Args {
    /// Log level selected by `--debug`/`--verbose`.
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.verbose {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Options for [`crate::apply`].
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            config_file: self.config_file.clone(),
            mapping_file: self.mapping_file.clone(),
            root_dir: self.root_dir.clone().unwrap_or_default(),
            noop: self.noop,
            persist_mapping: self.persist_mapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["os-net-config"]);
        assert_eq!(args.config_file, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(args.mapping_file, PathBuf::from(DEFAULT_MAPPING_FILE));
        assert_eq!(args.root_dir, None);
        assert_eq!(args.log_level(), Level::WARN);
        assert!(!args.noop);
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "os-net-config",
            "-c",
            "/tmp/config.yaml",
            "-r",
            "/tmp/root",
            "--noop",
            "-v",
            "--detailed-exit-codes",
        ]);
        assert_eq!(args.log_level(), Level::INFO);
        let opts = args.apply_options();
        assert_eq!(opts.config_file, PathBuf::from("/tmp/config.yaml"));
        assert_eq!(opts.root_dir, PathBuf::from("/tmp/root"));
        assert!(opts.noop);
        assert!(args.detailed_exit_codes);

        let args = Args::parse_from(["os-net-config", "-v", "-d"]);
        assert_eq!(args.log_level(), Level::DEBUG);
    }
}
