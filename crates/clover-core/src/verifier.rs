//! Post-write verification of embedded block checksums
//!
//! Every block the writer reported is read back on its own, its stored MD5 is
//! taken from bytes `[0, 16)`, and the digest is recomputed with that slot
//! zeroed. Verification is fail-fast: the first bad block ends the pass.
//!
//! A missing, short, or unreadable block is a finding about the media, not a
//! program error, and is reported the same way as a checksum mismatch.

use std::fmt;
use std::io::Read;
use std::time::{Duration, Instant};

use crate::block::{self, BlockChecksum};
use crate::error::{Error, Result};
use crate::store::BlockStore;
use crate::writer::{calculate_eta, format_speed};

// ============================================================================
// Failure reporting
// ============================================================================

/// Why a block failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Stored checksum does not match the block contents
    Mismatch {
        /// Checksum found in the block
        stored: BlockChecksum,
        /// Checksum recomputed from the block contents
        computed: BlockChecksum,
    },

    /// Block file is shorter than the block size
    Truncated {
        /// Block size
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// Block file could not be opened or read
    Unreadable(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Mismatch { stored, computed } => write!(
                f,
                "checksum mismatch: stored {}, computed {}",
                block::to_hex(stored),
                block::to_hex(computed)
            ),
            FailureCause::Truncated { expected, actual } => {
                write!(f, "truncated: read {} of {} bytes", actual, expected)
            }
            FailureCause::Unreadable(reason) => write!(f, "unreadable: {}", reason),
        }
    }
}

/// First block that failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFailure {
    /// 1-based block index
    pub index: u64,
    /// What was wrong with it
    pub cause: FailureCause,
}

// ============================================================================
// Progress
// ============================================================================

/// Verification progress information
#[derive(Debug, Clone)]
pub struct VerifyProgress {
    /// Blocks checked so far
    pub blocks_verified: u64,
    /// Blocks to check
    pub total_blocks: u64,
    /// Bytes checked so far
    pub bytes_verified: u64,
    /// Bytes to check
    pub total_bytes: u64,
    /// Current speed in bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining
    pub eta_seconds: Option<u64>,
    /// Elapsed time
    pub elapsed: Duration,
}

impl VerifyProgress {
    /// Calculate completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.bytes_verified as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Format speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&VerifyProgress) + Send + Sync>;

// ============================================================================
// Verification Result
// ============================================================================

/// Result of a verification pass
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Blocks that passed before the pass ended
    pub blocks_verified: u64,
    /// Bytes that passed before the pass ended
    pub bytes_verified: u64,
    /// First failing block, if any
    pub failure: Option<BlockFailure>,
    /// Elapsed time
    pub elapsed: Duration,
    /// Average speed
    pub speed_bps: u64,
}

impl VerificationResult {
    /// Whether every block matched its embedded checksum
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Index of the first block that failed
    pub fn first_failed_index(&self) -> Option<u64> {
        self.failure.as_ref().map(|f| f.index)
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Re-reads written blocks and checks their embedded checksums
pub struct Verifier {
    block_size: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Verifier {
    /// Create a verifier for blocks of `block_size` bytes
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&VerifyProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Check blocks `1..=blocks_written` in ascending order, stopping at the
    /// first failure
    ///
    /// Returns `Err` only when the location itself has gone away.
    pub fn verify<S: BlockStore>(
        &mut self,
        store: &S,
        blocks_written: u64,
    ) -> Result<VerificationResult> {
        block::validate_block_size(self.block_size)?;

        let block_bytes = self.block_size as u64;
        let total_bytes = blocks_written * block_bytes;
        let start = Instant::now();
        let mut buffer = Vec::with_capacity(self.block_size);
        let mut blocks_verified = 0u64;
        let mut failure = None;

        tracing::info!(
            "Verifying {} blocks in {}",
            blocks_written,
            store.location().display()
        );

        for index in 1..=blocks_written {
            if let Err(cause) = read_block(store, index, self.block_size, &mut buffer) {
                if !store.is_present() {
                    return Err(Error::DestinationLost(store.location().to_path_buf()));
                }
                failure = Some(BlockFailure { index, cause });
                break;
            }

            let (stored, computed) = block::extract(&mut buffer);
            if !block::checksums_match(&stored, &computed) {
                failure = Some(BlockFailure {
                    index,
                    cause: FailureCause::Mismatch { stored, computed },
                });
                break;
            }

            blocks_verified = index;
            tracing::debug!("Block {} verified", index);

            if let Some(ref callback) = self.progress_callback {
                let elapsed = start.elapsed();
                let bytes_verified = blocks_verified * block_bytes;
                let speed_bps = bytes_per_second(bytes_verified, elapsed);

                callback(&VerifyProgress {
                    blocks_verified,
                    total_blocks: blocks_written,
                    bytes_verified,
                    total_bytes,
                    speed_bps,
                    eta_seconds: calculate_eta(bytes_verified, total_bytes, speed_bps),
                    elapsed,
                });
            }
        }

        if let Some(ref f) = failure {
            tracing::warn!("Block {} failed verification: {}", f.index, f.cause);
        } else {
            tracing::info!("All {} blocks verified", blocks_verified);
        }

        let elapsed = start.elapsed();
        let bytes_verified = blocks_verified * block_bytes;

        Ok(VerificationResult {
            blocks_verified,
            bytes_verified,
            failure,
            elapsed,
            speed_bps: bytes_per_second(bytes_verified, elapsed),
        })
    }
}

/// Read block `index` into `buffer`; the handle is closed before returning
fn read_block<S: BlockStore>(
    store: &S,
    index: u64,
    block_size: usize,
    buffer: &mut Vec<u8>,
) -> std::result::Result<(), FailureCause> {
    let reader = store
        .open(index)
        .map_err(|e| FailureCause::Unreadable(e.to_string()))?;

    buffer.clear();
    reader
        .take(block_size as u64)
        .read_to_end(buffer)
        .map_err(|e| FailureCause::Unreadable(e.to_string()))?;

    if buffer.len() < block_size {
        return Err(FailureCause::Truncated {
            expected: block_size,
            actual: buffer.len(),
        });
    }

    Ok(())
}

fn bytes_per_second(bytes: u64, elapsed: Duration) -> u64 {
    if elapsed.as_secs_f64() > 0.0 {
        (bytes as f64 / elapsed.as_secs_f64()) as u64
    } else {
        0
    }
}
