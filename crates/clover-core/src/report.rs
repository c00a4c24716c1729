//! Run summaries and the sinks they are written to
//!
//! [`Reporter`] turns a [`RunResult`] into human-readable lines and hands
//! them to a [`ReportSink`]. The library never prints directly; the CLI plugs
//! in a coloured console sink, tests use [`PlainSink`] over a `Vec<u8>`.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::writer::format_speed;
use crate::RunResult;

/// Outcome of the integrity check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrityStatus {
    /// Every written block matched its embedded checksum
    Passed,
    /// A block was corrupt, truncated or unreadable
    Failed,
    /// The check was disabled by configuration
    Skipped,
}

impl fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityStatus::Passed => write!(f, "PASSED"),
            IntegrityStatus::Failed => write!(f, "FAILED"),
            IntegrityStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Percentage of the target that was written
///
/// Nothing written is 0%, and so is a zero target (which configuration
/// validation rejects before a run starts).
pub fn completion_percentage(bytes_written: u64, target_bytes: u64) -> f64 {
    if bytes_written == 0 || target_bytes == 0 {
        return 0.0;
    }
    (bytes_written as f64 / target_bytes as f64) * 100.0
}

/// Format a percentage without trailing zeros for whole numbers
pub fn format_percentage(percentage: f64) -> String {
    if percentage.fract() == 0.0 {
        format!("{:.0}", percentage)
    } else {
        format!("{:.2}", percentage)
    }
}

/// Serializable summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Directory the blocks were written to
    pub location: String,
    /// Seconds spent writing
    pub elapsed_seconds: f64,
    /// Bytes requested
    pub target_bytes: u64,
    /// Bytes the device accepted
    pub bytes_written: u64,
    /// `bytes_written / target_bytes * 100`
    pub percentage: f64,
    /// Complete blocks written
    pub blocks_written: u64,
    /// Size of each block
    pub block_size: usize,
    /// Average write speed in bytes per second
    pub average_speed_bps: u64,
    /// Whether the device refused a block before the target was reached
    pub capacity_reached: bool,
    /// Integrity check outcome
    pub integrity: IntegrityStatus,
    /// First block that failed verification
    pub first_failed_index: Option<u64>,
    /// Description of the verification failure
    pub failure: Option<String>,
    /// Seconds spent verifying
    pub verify_seconds: Option<f64>,
    /// Block files deleted
    pub files_removed: u64,
    /// Block files kept on request
    pub files_kept: u64,
    /// Blocks whose files could not be deleted
    pub cleanup_failures: Vec<u64>,
}

impl Summary {
    /// Build a summary of `run` against `location`
    pub fn from_run(run: &RunResult, location: &Path) -> Self {
        Self {
            location: location.display().to_string(),
            elapsed_seconds: run.elapsed.as_secs_f64(),
            target_bytes: run.target_bytes,
            bytes_written: run.bytes_written,
            percentage: run.percentage(),
            blocks_written: run.blocks_written,
            block_size: run.block_size,
            average_speed_bps: run.average_speed,
            capacity_reached: run.stop_reason.is_capacity_reached(),
            integrity: run.integrity,
            first_failed_index: run.first_failed_index(),
            failure: run.failure.as_ref().map(|f| f.cause.to_string()),
            verify_seconds: run.verify_elapsed.map(|d| d.as_secs_f64()),
            files_removed: run.cleanup.removed,
            files_kept: run.cleanup.kept,
            cleanup_failures: run.cleanup.failures.iter().map(|f| f.index).collect(),
        }
    }
}

/// Destination for summary lines
pub trait ReportSink {
    /// Section heading
    fn heading(&mut self, text: &str) -> io::Result<()>;

    /// Informational line
    fn info(&mut self, text: &str) -> io::Result<()>;

    /// Something the user should look at
    fn warning(&mut self, text: &str) -> io::Result<()>;

    /// The integrity verdict, with detail for failures
    fn integrity(&mut self, status: IntegrityStatus, detail: Option<&str>) -> io::Result<()>;
}

/// Uncoloured sink over any writer
#[derive(Debug)]
pub struct PlainSink<W: Write> {
    out: W,
}

impl<W: Write> PlainSink<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the wrapped writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for PlainSink<W> {
    fn heading(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    fn info(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    fn warning(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "Warning: {}", text)
    }

    fn integrity(&mut self, status: IntegrityStatus, detail: Option<&str>) -> io::Result<()> {
        integrity_line(&mut self.out, status, detail)
    }
}

/// `File Integrity -> STATUS`, with the failure detail appended
pub fn integrity_line<W: Write>(
    out: &mut W,
    status: IntegrityStatus,
    detail: Option<&str>,
) -> io::Result<()> {
    match detail {
        Some(detail) => writeln!(out, "File Integrity -> {} ({})", status, detail),
        None => writeln!(out, "File Integrity -> {}", status),
    }
}

/// Writes run summaries to a sink
pub struct Reporter<S: ReportSink> {
    sink: S,
}

impl<S: ReportSink> Reporter<S> {
    /// Create a reporter writing to `sink`
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Recover the sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Write the summary of a run
    pub fn report(&mut self, summary: &Summary) -> io::Result<()> {
        self.sink.heading("------------- Summary -------------")?;
        self.sink
            .info(&format!("Run for {:.2} seconds...", summary.elapsed_seconds))?;
        self.sink.info(&format!(
            "Managed to write {}/{} ({}%) bytes to {}",
            summary.bytes_written,
            summary.target_bytes,
            format_percentage(summary.percentage),
            summary.location
        ))?;
        self.sink.info(&format!(
            "Average write speed: {}",
            format_speed(summary.average_speed_bps)
        ))?;

        if summary.capacity_reached {
            self.sink.warning(&format!(
                "Device stopped accepting data after {} blocks",
                summary.blocks_written
            ))?;
        }

        let detail = match (summary.first_failed_index, &summary.failure) {
            (Some(index), Some(cause)) => Some(format!("block {}: {}", index, cause)),
            _ => None,
        };
        self.sink.integrity(summary.integrity, detail.as_deref())?;

        if summary.files_kept > 0 {
            self.sink.info(&format!(
                "Kept {} data files in {}",
                summary.files_kept, summary.location
            ))?;
        } else if summary.files_removed > 0 {
            self.sink
                .info(&format!("Deleted {} data files", summary.files_removed))?;
        }

        if !summary.cleanup_failures.is_empty() {
            let blocks: Vec<String> = summary
                .cleanup_failures
                .iter()
                .map(u64::to_string)
                .collect();
            self.sink.warning(&format!(
                "Unable to delete {} data files (blocks {})",
                summary.cleanup_failures.len(),
                blocks.join(", ")
            ))?;
        }

        Ok(())
    }
}
