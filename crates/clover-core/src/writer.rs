//! Capacity-bounded block writer with progress tracking
//!
//! The writer streams generated blocks into a [`BlockStore`] until the target
//! size is reached or the device stops accepting data. A refused or short
//! write is how fake-capacity media show themselves, so it ends the run
//! normally with [`StopReason::CapacityReached`] rather than an error.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::block::{self, BlockGenerator};
use crate::error::{Error, Result};
use crate::store::BlockStore;

/// Write progress information
#[derive(Debug, Clone)]
pub struct WriteProgress {
    /// Bytes written so far
    pub bytes_written: u64,

    /// Total bytes requested
    pub total_bytes: u64,

    /// Blocks completed so far
    pub blocks_written: u64,

    /// Number of whole blocks that fit in the target
    pub total_blocks: u64,

    /// Current write speed in bytes per second
    pub speed_bps: u64,

    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,

    /// Elapsed time since start
    pub elapsed: Duration,
}

impl WriteProgress {
    /// Create a new progress instance
    pub fn new(total_bytes: u64, block_size: usize) -> Self {
        Self {
            bytes_written: 0,
            total_bytes,
            blocks_written: 0,
            total_blocks: total_bytes / block_size as u64,
            speed_bps: 0,
            eta_seconds: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_written as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Format speed for display (e.g., "45.2 MB/s")
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }

    /// Format ETA for display (e.g., "2m 30s")
    pub fn eta_display(&self) -> String {
        match self.eta_seconds {
            Some(secs) if secs > 0 => format_duration(secs),
            _ => "calculating...".to_string(),
        }
    }
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&WriteProgress) + Send + Sync>;

/// Why the write loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every whole block that fits in the target was written
    TargetReached,

    /// The device refused block `index` (error or short write)
    CapacityReached {
        /// Block that could not be written
        index: u64,
        /// What the device reported
        cause: String,
    },
}

impl StopReason {
    /// Whether the device ran out of room before the target
    pub fn is_capacity_reached(&self) -> bool {
        matches!(self, StopReason::CapacityReached { .. })
    }
}

/// Result of a write stage
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Number of complete blocks on the device
    pub blocks_written: u64,

    /// Total bytes written (`blocks_written * block_size`)
    pub bytes_written: u64,

    /// Size of each block
    pub block_size: usize,

    /// Bytes requested
    pub target_bytes: u64,

    /// Total time elapsed
    pub elapsed: Duration,

    /// Average speed in bytes per second
    pub average_speed: u64,

    /// Why writing stopped
    pub stop_reason: StopReason,
}

impl WriteResult {
    /// Format average speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.average_speed)
    }
}

/// Writer engine for capacity probing
pub struct Writer {
    generator: BlockGenerator,
    progress_callback: Option<ProgressCallback>,
}

impl Writer {
    /// Create a writer producing blocks from `generator`
    pub fn new(generator: BlockGenerator) -> Self {
        Self {
            generator,
            progress_callback: None,
        }
    }

    /// Set a progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WriteProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Block size used by this writer
    pub fn block_size(&self) -> usize {
        self.generator.block_size()
    }

    /// Write blocks `1, 2, ...` into `store` until `target_bytes` is reached
    /// or the device refuses a block
    ///
    /// # Returns
    /// * `Ok(WriteResult)` - Blocks written, possibly fewer than requested
    /// * `Err(Error::InvalidConfig)` - Zero target or unusable location
    /// * `Err(Error::DestinationLost)` - The location vanished mid-run
    pub fn fill<S: BlockStore>(&mut self, store: &S, target_bytes: u64) -> Result<WriteResult> {
        if target_bytes == 0 {
            return Err(Error::InvalidConfig(
                "size must be greater than zero".to_string(),
            ));
        }
        store.check_ready()?;

        let block_size = self.generator.block_size();
        let block_bytes = block_size as u64;

        tracing::info!(
            "Writing {} bytes to {} in {} byte blocks",
            target_bytes,
            store.location().display(),
            block_size
        );

        let start_time = Instant::now();
        let mut buffer = Vec::with_capacity(block_size);
        let mut progress = WriteProgress::new(target_bytes, block_size);
        let mut speed_tracker = SpeedTracker::new();
        let mut stop_reason = StopReason::TargetReached;

        while progress.bytes_written + block_bytes <= target_bytes {
            let index = progress.blocks_written + 1;

            self.generator.fill(index, &mut buffer);
            block::embed(&mut buffer);

            if let Err(e) = write_block(store, index, &buffer) {
                if !store.is_present() {
                    return Err(Error::DestinationLost(store.location().to_path_buf()));
                }

                tracing::warn!("Unable to write block {}: {}", index, e);
                discard_partial(store, index);

                stop_reason = StopReason::CapacityReached {
                    index,
                    cause: e.to_string(),
                };
                break;
            }

            progress.blocks_written = index;
            progress.bytes_written += block_bytes;
            tracing::debug!("Wrote block {}", index);

            progress.elapsed = start_time.elapsed();
            speed_tracker.update(progress.bytes_written);
            progress.speed_bps = speed_tracker.current_speed();
            progress.eta_seconds = calculate_eta(
                progress.bytes_written,
                progress.total_bytes,
                progress.speed_bps,
            );

            if let Some(ref callback) = self.progress_callback {
                callback(&progress);
            }
        }

        let elapsed = start_time.elapsed();
        let average_speed = if elapsed.as_secs_f64() > 0.0 {
            (progress.bytes_written as f64 / elapsed.as_secs_f64()) as u64
        } else {
            progress.bytes_written
        };

        tracing::info!(
            "Wrote {} blocks ({} bytes) in {:.2}s",
            progress.blocks_written,
            progress.bytes_written,
            elapsed.as_secs_f64()
        );

        Ok(WriteResult {
            blocks_written: progress.blocks_written,
            bytes_written: progress.bytes_written,
            block_size,
            target_bytes,
            elapsed,
            average_speed,
            stop_reason,
        })
    }
}

/// Create, write, flush and close a single block
fn write_block<S: BlockStore>(store: &S, index: u64, data: &[u8]) -> io::Result<()> {
    let mut target = store.create(index)?;
    write_full(&mut target, data)?;
    target.flush()
}

/// Write the whole buffer, failing on a write that makes no progress
fn write_full<W: Write>(target: &mut W, data: &[u8]) -> io::Result<()> {
    let mut written = 0;

    while written < data.len() {
        match target.write(&data[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, data.len()),
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Remove whatever a failed write left behind for block `index`
fn discard_partial<S: BlockStore>(store: &S, index: u64) {
    match store.remove(index) {
        Ok(()) => tracing::debug!("Removed partial block {}", index),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Unable to remove partial block {}: {}", index, e),
    }
}

/// Speed tracking with smoothing
struct SpeedTracker {
    samples: Vec<(Instant, u64)>,
    max_samples: usize,
}

impl SpeedTracker {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(10),
            max_samples: 10,
        }
    }

    fn update(&mut self, bytes_written: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push((Instant::now(), bytes_written));
    }

    fn current_speed(&self) -> u64 {
        if self.samples.len() < 2 {
            return 0;
        }

        let first = &self.samples[0];
        let last = &self.samples[self.samples.len() - 1];

        let duration = last.0.duration_since(first.0);
        let bytes = last.1.saturating_sub(first.1);

        if duration.as_millis() > 0 {
            (bytes as f64 / duration.as_secs_f64()) as u64
        } else {
            0
        }
    }
}

/// Calculate estimated time remaining
pub(crate) fn calculate_eta(done: u64, total: u64, speed_bps: u64) -> Option<u64> {
    if speed_bps == 0 || done >= total {
        return None;
    }

    Some(total.saturating_sub(done) / speed_bps)
}

/// Format speed for display
pub fn format_speed(bytes_per_second: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes_per_second >= GB {
        format!("{:.1} GB/s", bytes_per_second as f64 / GB as f64)
    } else if bytes_per_second >= MB {
        format!("{:.1} MB/s", bytes_per_second as f64 / MB as f64)
    } else if bytes_per_second >= KB {
        format!("{:.1} KB/s", bytes_per_second as f64 / KB as f64)
    } else {
        format!("{} B/s", bytes_per_second)
    }
}

/// Format duration for display
pub fn format_duration(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
