//! # Clover Core
//!
//! Core library for the Clover storage probe. A probe writes fixed-size,
//! self-checking block files to a location until the target size is reached
//! or the device stops accepting data, reads every block back to check its
//! embedded checksum, then removes the files.
//!
//! ## Modules
//!
//! - `block`: Deterministic block content and embedded MD5 checksums
//! - `store`: Where block files live (`<dir>/cloverdata<N>.bin`)
//! - `writer`: Capacity-bounded block writer with progress tracking
//! - `verifier`: Fail-fast read-back verification
//! - `cleanup`: Best-effort removal of block files
//! - `report`: Run summaries and output sinks
//! - `config`: Run configuration
//! - `settings`: Persistent user settings from configuration file
//! - `error`: Error types and result aliases
//!
//! ## Example
//!
//! ```no_run
//! use clover_core::{PlainSink, Probe, ProbeConfig, Reporter, Summary};
//!
//! let config = ProbeConfig::new("/media/sdcard", 8 * 1024 * 1024 * 1024);
//! let mut probe = Probe::with_config(config.clone())
//!     .on_write_progress(|p| println!("{:.1}% - {}", p.percentage(), p.speed_display()));
//!
//! let run = probe.run()?;
//! let mut reporter = Reporter::new(PlainSink::new(std::io::stdout()));
//! reporter.report(&Summary::from_run(&run, &config.location))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod report;
pub mod settings;
pub mod store;
pub mod verifier;
pub mod writer;

use std::sync::Arc;
use std::time::Duration;

pub use block::{
    BlockChecksum, BlockGenerator, CHECKSUM_LEN, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE,
    MIN_BLOCK_SIZE,
};
pub use cleanup::{cleanup, CleanupFailure, CleanupReport};
pub use config::{parse_size, ProbeConfig};
pub use error::{Error, Result};
pub use report::{
    completion_percentage, IntegrityStatus, PlainSink, ReportSink, Reporter, Summary,
};
pub use settings::{OutputSettings, ProbeSettings, Settings, SettingsError};
pub use store::{block_path, BlockStore, DirStore};
pub use verifier::{BlockFailure, FailureCause, VerificationResult, Verifier, VerifyProgress};
pub use writer::{format_duration, format_speed, StopReason, WriteProgress, WriteResult, Writer};

type WriteCallback = Arc<dyn Fn(&WriteProgress) + Send + Sync>;
type VerifyCallback = Arc<dyn Fn(&VerifyProgress) + Send + Sync>;

/// Everything a probe run found out, handed to the reporter
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Complete blocks written
    pub blocks_written: u64,
    /// Bytes written (`blocks_written * block_size`)
    pub bytes_written: u64,
    /// Bytes requested
    pub target_bytes: u64,
    /// Size of each block
    pub block_size: usize,
    /// Time spent writing
    pub elapsed: Duration,
    /// Average write speed in bytes per second
    pub average_speed: u64,
    /// Why writing stopped
    pub stop_reason: StopReason,
    /// Integrity verdict
    pub integrity: IntegrityStatus,
    /// First block that failed verification
    pub failure: Option<BlockFailure>,
    /// Time spent verifying, when verification ran
    pub verify_elapsed: Option<Duration>,
    /// What the cleanup stage did
    pub cleanup: CleanupReport,
}

impl RunResult {
    /// Assemble the result of the three pipeline stages
    pub fn new(
        write: WriteResult,
        verification: Option<VerificationResult>,
        cleanup: CleanupReport,
    ) -> Self {
        let (integrity, failure, verify_elapsed) = match verification {
            Some(v) if v.passed() => (IntegrityStatus::Passed, None, Some(v.elapsed)),
            Some(v) => (IntegrityStatus::Failed, v.failure, Some(v.elapsed)),
            None => (IntegrityStatus::Skipped, None, None),
        };

        Self {
            blocks_written: write.blocks_written,
            bytes_written: write.bytes_written,
            target_bytes: write.target_bytes,
            block_size: write.block_size,
            elapsed: write.elapsed,
            average_speed: write.average_speed,
            stop_reason: write.stop_reason,
            integrity,
            failure,
            verify_elapsed,
            cleanup,
        }
    }

    /// Index of the first block that failed verification
    pub fn first_failed_index(&self) -> Option<u64> {
        self.failure.as_ref().map(|f| f.index)
    }

    /// Percentage of the target that was written
    pub fn percentage(&self) -> f64 {
        completion_percentage(self.bytes_written, self.target_bytes)
    }

    /// Whether the run found nothing wrong with the media
    pub fn is_healthy(&self) -> bool {
        self.integrity != IntegrityStatus::Failed
    }
}

/// Runs the write, verify and cleanup stages in order
pub struct Probe {
    config: ProbeConfig,
    write_progress: Option<WriteCallback>,
    verify_progress: Option<VerifyCallback>,
}

impl Probe {
    /// Create a probe for `config`
    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            config,
            write_progress: None,
            verify_progress: None,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Progress callback for the write stage
    pub fn on_write_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WriteProgress) + Send + Sync + 'static,
    {
        self.write_progress = Some(Arc::new(callback));
        self
    }

    /// Progress callback for the verify stage
    pub fn on_verify_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&VerifyProgress) + Send + Sync + 'static,
    {
        self.verify_progress = Some(Arc::new(callback));
        self
    }

    /// Probe the configured directory
    pub fn run(&mut self) -> Result<RunResult> {
        self.config.validate()?;
        let store = DirStore::new(&self.config.location).sync(self.config.sync);
        self.run_with_store(&store)
    }

    /// Probe any block store with the configured sizes and stages
    pub fn run_with_store<S: BlockStore>(&mut self, store: &S) -> Result<RunResult> {
        let generator = BlockGenerator::new(self.config.block_size)?;

        let mut writer = Writer::new(generator);
        if let Some(callback) = self.write_progress.clone() {
            writer = writer.on_progress(move |p| callback(p));
        }
        let write = writer.fill(store, self.config.target_bytes)?;

        let verification = if self.config.verify {
            let mut verifier = Verifier::new(self.config.block_size);
            if let Some(callback) = self.verify_progress.clone() {
                verifier = verifier.on_progress(move |p| callback(p));
            }
            Some(verifier.verify(store, write.blocks_written)?)
        } else {
            tracing::info!("Skipping integrity check");
            None
        };

        let cleanup = cleanup(store, self.config.keep_files, write.blocks_written);

        Ok(RunResult::new(write, verification, cleanup))
    }
}
