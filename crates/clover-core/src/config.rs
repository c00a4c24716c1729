//! Run configuration for a capacity probe

use std::path::PathBuf;

use crate::block::{validate_block_size, DEFAULT_BLOCK_SIZE};
use crate::error::{Error, Result};

/// Configuration for a single probe run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Directory the block files are written to
    pub location: PathBuf,

    /// Total bytes to attempt to write
    pub target_bytes: u64,

    /// Size of each block file
    pub block_size: usize,

    /// Re-read and check every block after writing
    pub verify: bool,

    /// Leave the block files in place after the run
    pub keep_files: bool,

    /// Sync every block to the device as it is written
    pub sync: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::new(),
            target_bytes: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            verify: true,
            keep_files: false,
            sync: false,
        }
    }
}

impl ProbeConfig {
    /// Create a config for writing `target_bytes` into `location`
    pub fn new(location: impl Into<PathBuf>, target_bytes: u64) -> Self {
        Self {
            location: location.into(),
            target_bytes,
            ..Self::default()
        }
    }

    /// Set block size
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Set verify mode
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Keep block files after the run
    pub fn keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    /// Sync each block to the device
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        if self.location.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("location must not be empty".to_string()));
        }
        if self.target_bytes == 0 {
            return Err(Error::InvalidConfig(
                "size must be greater than zero".to_string(),
            ));
        }
        validate_block_size(self.block_size)
    }
}

/// Parse a size string like "1024000", "512K", "4M", "2G" into bytes
///
/// Suffixes are binary multiples. A bare number is a byte count.
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidConfig("empty size".to_string()));
    }

    let split_pos = s.find(|c: char| c.is_alphabetic()).unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(split_pos);

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid size: {}", s)))?;

    let multiplier: u64 = match suffix.to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        "T" | "TB" | "TIB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(Error::InvalidConfig(format!("invalid size suffix: {}", s))),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| Error::InvalidConfig(format!("size {} is too large", s)))
}
