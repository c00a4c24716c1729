//! Error types for the Clover core library
//!
//! Only conditions that stop a run are errors. A device refusing a write
//! (capacity reached), a block failing its checksum, or a block file that
//! cannot be deleted are findings about the media and are reported through
//! [`crate::RunResult`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Clover operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, raised before any I/O takes place
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The destination directory vanished while the probe was running
    #[error("Destination disappeared during the run: {}", .0.display())]
    DestinationLost(PathBuf),
}

/// Result type alias using the Clover error type
pub type Result<T> = std::result::Result<T, Error>;
