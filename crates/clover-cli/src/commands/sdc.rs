//! Storage device check - the probe command
//!
//! Merges the settings file with command-line flags, runs the write, verify
//! and cleanup stages with progress bars, and prints the summary either as
//! coloured text or as JSON.

use anyhow::{Context, Result};
use console::{style, Term};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;

use clover_core::{
    parse_size, IntegrityStatus, Probe, ProbeConfig, ReportSink, Reporter, Settings, Summary,
    VerifyProgress, WriteProgress,
};

/// Arguments for the sdc command
pub struct SdcArgs {
    pub location: PathBuf,
    pub size: u64,
    pub skip_integrity_check: bool,
    pub no_delete: bool,
    pub block_size: Option<String>,
    pub sync: bool,
    pub json: bool,
    pub quiet: bool,
    pub settings: Settings,
}

/// Execute the sdc command, returning the integrity verdict
pub fn execute(args: SdcArgs) -> Result<IntegrityStatus> {
    let config = build_config(&args)?;
    config.validate()?;

    let show_progress = !(args.quiet || args.json);

    if show_progress {
        println!(
            "{} {}",
            style("Location:").bold(),
            style(config.location.display()).cyan()
        );
        println!(
            "{} {} in {} blocks",
            style("Target:").bold(),
            format_size(config.target_bytes, BINARY),
            format_size(config.block_size as u64, BINARY)
        );
        if !config.verify {
            println!("  {} Integrity check disabled", style("ℹ").blue());
        }
        println!("\n{}", style("Writing blocks...").bold());
    }

    let write_bar = create_progress_bar(config.target_bytes, "Writing", show_progress);
    let verify_bar = create_progress_bar(0, "Verifying", show_progress);

    let write_pb = write_bar.clone();
    let verify_pb = verify_bar.clone();
    let finished_write_pb = write_bar.clone();

    let mut probe = Probe::with_config(config.clone())
        .on_write_progress(move |progress: &WriteProgress| {
            write_pb.set_position(progress.bytes_written);
            write_pb.set_message(format!(
                "{}/s, ETA {}",
                format_size(progress.speed_bps, BINARY),
                progress.eta_display()
            ));
        })
        .on_verify_progress(move |progress: &VerifyProgress| {
            if !finished_write_pb.is_finished() {
                finished_write_pb.finish_and_clear();
            }
            if verify_pb.length() != Some(progress.total_bytes) {
                verify_pb.set_length(progress.total_bytes);
            }
            verify_pb.set_position(progress.bytes_verified);
            verify_pb.set_message(format!("{}/s", format_size(progress.speed_bps, BINARY)));
        });

    let result = probe.run();
    write_bar.finish_and_clear();
    verify_bar.finish_and_clear();

    let run = result.with_context(|| format!("Probe of {} failed", config.location.display()))?;
    let summary = Summary::from_run(&run, &config.location);

    if args.json {
        let json_output =
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{}", json_output);
    } else {
        Reporter::new(ConsoleSink::new())
            .report(&summary)
            .context("Failed to write summary")?;
    }

    Ok(run.integrity)
}

/// Resolve the probe configuration: settings file first, flags on top
///
/// The settings block size is only consulted when `--block-size` is absent,
/// so a bad value in the file cannot block an explicit flag.
fn build_config(args: &SdcArgs) -> Result<ProbeConfig> {
    let probe = &args.settings.probe;
    let block_size = match &args.block_size {
        Some(block_size) => parse_block_size(block_size)?,
        None => probe.block_size_bytes().context("Invalid settings file")?,
    };

    let mut config =
        probe.apply_switches(ProbeConfig::new(&args.location, args.size).block_size(block_size));

    if args.skip_integrity_check {
        config = config.verify(false);
    }
    if args.no_delete {
        config = config.keep_files(true);
    }
    if args.sync {
        config = config.sync(true);
    }

    Ok(config)
}

/// Parse a block size string (e.g., "4M", "1000K")
fn parse_block_size(s: &str) -> Result<usize> {
    let size = parse_size(s).with_context(|| format!("Invalid block size: {}", s))?;
    usize::try_from(size).with_context(|| format!("Block size {} is too large", s))
}

/// Create a byte progress bar; hidden when progress output is off
fn create_progress_bar(total: u64, operation: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "  {{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} {{msg}}",
                operation
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    pb
}

/// Coloured summary output on stdout
struct ConsoleSink {
    term: Term,
}

impl ConsoleSink {
    fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl ReportSink for ConsoleSink {
    fn heading(&mut self, text: &str) -> io::Result<()> {
        self.term.write_line("")?;
        self.term.write_line(&style(text).bold().to_string())
    }

    fn info(&mut self, text: &str) -> io::Result<()> {
        self.term.write_line(text)
    }

    fn warning(&mut self, text: &str) -> io::Result<()> {
        self.term
            .write_line(&format!("{} {}", style("Warning:").yellow().bold(), text))
    }

    fn integrity(&mut self, status: IntegrityStatus, detail: Option<&str>) -> io::Result<()> {
        let status = match status {
            IntegrityStatus::Passed => style(status).green().bold(),
            IntegrityStatus::Failed => style(status).red().bold(),
            IntegrityStatus::Skipped => style(status).yellow(),
        };

        match detail {
            Some(detail) => self
                .term
                .write_line(&format!("File Integrity -> {} ({})", status, detail)),
            None => self.term.write_line(&format!("File Integrity -> {}", status)),
        }
    }
}
