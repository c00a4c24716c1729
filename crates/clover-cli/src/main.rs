//! Clover - Check storage devices for fake capacity and corrupted writes
//!
//! # Usage
//!
//! ```bash
//! # Fill an SD card with up to 32 GiB of block files, verify and delete them
//! clover sdc --location /media/sdcard --size 32G
//!
//! # Keep the block files and skip the read-back pass
//! clover sdc --location /media/sdcard --size 8G --no-delete --skip-integrity-check
//!
//! # Machine-readable summary
//! clover check --location /mnt/usb --size 500M --json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use clover_core::{IntegrityStatus, Settings};

mod commands;

/// Exit status when a block failed its integrity check
const EXIT_INTEGRITY_FAILED: i32 = 2;

/// Exit status for configuration and fatal errors
const EXIT_ERROR: i32 = 1;

/// Clover - Check storage devices for fake capacity and corrupted writes
#[derive(Parser, Debug)]
#[command(name = "clover")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress logs and progress bars
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use an alternative settings file
    #[arg(long, global = true, value_name = "FILE", env = "CLOVER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write, verify and remove block files to test a device's real capacity
    #[command(visible_alias = "check")]
    Sdc {
        /// Directory on the device to write block files into
        #[arg(short, long, value_name = "DIR")]
        location: PathBuf,

        /// Total bytes to write (e.g., 32G, 500M, 1000000)
        #[arg(short, long, value_name = "SIZE", value_parser = parse_size_arg)]
        size: u64,

        /// Skip reading the blocks back after writing
        #[arg(long)]
        skip_integrity_check: bool,

        /// Leave the block files on the device
        #[arg(long)]
        no_delete: bool,

        /// Size of each block file (e.g., 1000K, 4M)
        #[arg(short, long, value_name = "SIZE")]
        block_size: Option<String>,

        /// Sync every block to the device as it is written
        #[arg(long)]
        sync: bool,

        /// Print the summary in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize the settings file
    Config {
        /// Create a settings file with default values
        #[arg(long)]
        init: bool,

        /// Print the settings file path
        #[arg(long)]
        path: bool,

        /// Show settings in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn parse_size_arg(s: &str) -> std::result::Result<u64, String> {
    clover_core::parse_size(s).map_err(|e| e.to_string())
}

fn main() {
    // Set up panic handler for nicer error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    // Usage errors share the configuration error status; help and version
    // are not errors
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_ERROR } else { 0 });
        }
    };

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);

            // Show cause chain in verbose mode
            if std::env::var("RUST_BACKTRACE").is_ok() {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  {} {}", style("Caused by:").yellow(), cause);
                    source = cause.source();
                }
            }

            std::process::exit(EXIT_ERROR);
        }
    }
}

/// Log level for the command-line and settings verbosity
fn log_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "off"
    } else {
        "info"
    }
}

/// Stderr log subscriber at the given level
fn log_subscriber(level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    // Logs go to stderr so stdout stays clean for the summary
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish()
}

fn run(cli: Cli) -> Result<i32> {
    let config_file = cli.config.or_else(Settings::config_path);

    // Settings decide the final log level, so they are loaded under the
    // command-line level alone
    let settings = tracing::subscriber::with_default(
        log_subscriber(log_filter(cli.verbose, cli.quiet)),
        || Settings::load_from_path(config_file.clone()),
    );
    let quiet = cli.quiet || settings.output.quiet;

    log_subscriber(log_filter(cli.verbose, quiet)).init();

    match cli.command {
        Commands::Sdc {
            location,
            size,
            skip_integrity_check,
            no_delete,
            block_size,
            sync,
            json,
        } => {
            let status = commands::sdc::execute(commands::sdc::SdcArgs {
                location,
                size,
                skip_integrity_check,
                no_delete,
                block_size,
                sync,
                json: json || settings.output.json,
                quiet,
                settings,
            })?;

            Ok(match status {
                IntegrityStatus::Failed => EXIT_INTEGRITY_FAILED,
                IntegrityStatus::Passed | IntegrityStatus::Skipped => 0,
            })
        }
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                quiet,
                config_file,
            })?;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(false, false), "info");
        assert_eq!(log_filter(false, true), "off");
        assert_eq!(log_filter(true, false), "debug");
        assert_eq!(log_filter(true, true), "debug");
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sdc_flags() {
        let cli = Cli::try_parse_from([
            "clover",
            "sdc",
            "--location",
            "/media/card",
            "--size",
            "2G",
            "--no-delete",
            "--block-size",
            "4M",
        ])
        .unwrap();

        match cli.command {
            Commands::Sdc {
                location,
                size,
                no_delete,
                skip_integrity_check,
                block_size,
                ..
            } => {
                assert_eq!(location, PathBuf::from("/media/card"));
                assert_eq!(size, 2 * 1024 * 1024 * 1024);
                assert!(no_delete);
                assert!(!skip_integrity_check);
                assert_eq!(block_size.as_deref(), Some("4M"));
            }
            _ => panic!("expected sdc"),
        }
    }

    #[test]
    fn test_check_alias() {
        let cli =
            Cli::try_parse_from(["clover", "check", "--location", "/tmp", "--size", "1M"]).unwrap();
        assert!(matches!(cli.command, Commands::Sdc { .. }));
    }

    #[test]
    fn test_missing_location_is_usage_error() {
        let err = Cli::try_parse_from(["clover", "sdc", "--size", "1M"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_bad_size_is_usage_error() {
        let result = Cli::try_parse_from(["clover", "sdc", "--location", "/tmp", "--size", "lots"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_is_not_an_error() {
        let err = Cli::try_parse_from(["clover", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
