//! Block storage backends
//!
//! [`BlockStore`] is the seam between the pipeline and the storage location.
//! Every operation is keyed by block index and hands out a fresh, owned
//! handle, so a file is open only for the duration of its single write or
//! read.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name prefix for block files
pub const FILE_PREFIX: &str = "cloverdata";

/// File extension for block files
pub const FILE_EXTENSION: &str = "bin";

/// Storage location that holds one artifact per block
pub trait BlockStore {
    /// Handle used for the single write of a block
    type Writer: Write;

    /// Handle used for the single read of a block
    type Reader: Read;

    /// Location shown in logs and summaries
    fn location(&self) -> &Path;

    /// Check the location can accept blocks before anything is written
    fn check_ready(&self) -> Result<()>;

    /// Whether the location itself still exists
    fn is_present(&self) -> bool;

    /// Create (or truncate) the artifact for block `index`
    fn create(&self, index: u64) -> io::Result<Self::Writer>;

    /// Open the artifact for block `index` for reading
    fn open(&self, index: u64) -> io::Result<Self::Reader>;

    /// Delete the artifact for block `index`
    fn remove(&self, index: u64) -> io::Result<()>;
}

/// Path of block `index` inside `dir`: `<dir>/cloverdata<index>.bin`
pub fn block_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{}{}.{}", FILE_PREFIX, index, FILE_EXTENSION))
}

/// Block store backed by a directory on the device under test
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
    sync: bool,
}

impl DirStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sync: false,
        }
    }

    /// Force every block to stable storage when it is flushed
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Path of block `index` in this store
    pub fn path_for(&self, index: u64) -> PathBuf {
        block_path(&self.dir, index)
    }
}

impl BlockStore for DirStore {
    type Writer = BlockFile;
    type Reader = File;

    fn location(&self) -> &Path {
        &self.dir
    }

    fn check_ready(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("location must not be empty".to_string()));
        }

        let metadata = fs::metadata(&self.dir).map_err(|e| {
            Error::InvalidConfig(format!(
                "location {} is not accessible: {}",
                self.dir.display(),
                e
            ))
        })?;

        if !metadata.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "location {} is not a directory",
                self.dir.display()
            )));
        }

        if metadata.permissions().readonly() {
            return Err(Error::InvalidConfig(format!(
                "location {} is read-only",
                self.dir.display()
            )));
        }

        // Mode bits miss foreign owners and read-only mounts, so try a real
        // create. The scratch file is removed when it drops.
        tempfile::Builder::new()
            .prefix(".clover-")
            .tempfile_in(&self.dir)
            .map_err(|e| {
                Error::InvalidConfig(format!(
                    "location {} is not writable: {}",
                    self.dir.display(),
                    e
                ))
            })?;

        Ok(())
    }

    fn is_present(&self) -> bool {
        self.dir.is_dir()
    }

    fn create(&self, index: u64) -> io::Result<BlockFile> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path_for(index))?;
        Ok(BlockFile {
            file,
            sync: self.sync,
        })
    }

    fn open(&self, index: u64) -> io::Result<File> {
        File::open(self.path_for(index))
    }

    fn remove(&self, index: u64) -> io::Result<()> {
        fs::remove_file(self.path_for(index))
    }
}

/// Write handle for a block file
///
/// Flushing also syncs the file to the device when the store was built with
/// [`DirStore::sync`].
#[derive(Debug)]
pub struct BlockFile {
    file: File,
    sync: bool,
}

impl Write for BlockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
