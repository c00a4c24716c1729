//! Best-effort removal of block files after a run

use crate::store::BlockStore;

/// A block file that could not be deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// 1-based block index
    pub index: u64,
    /// Reason reported by the store
    pub error: String,
}

/// Outcome of the cleanup stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files left in place on request
    pub kept: u64,
    /// Files deleted
    pub removed: u64,
    /// Files that could not be deleted
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Whether every file that should have been deleted was
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete block files `1..=blocks_written`, or keep them all when
/// `keep_files` is set
///
/// Each deletion is independent; a failure is logged and the remaining files
/// are still attempted.
pub fn cleanup<S: BlockStore>(store: &S, keep_files: bool, blocks_written: u64) -> CleanupReport {
    if keep_files {
        tracing::info!(
            "Keeping {} data files in {}",
            blocks_written,
            store.location().display()
        );
        return CleanupReport {
            kept: blocks_written,
            ..Default::default()
        };
    }

    tracing::info!("Deleting {} data files", blocks_written);

    let mut report = CleanupReport::default();
    for index in 1..=blocks_written {
        match store.remove(index) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                tracing::warn!("Unable to delete block {}: {}", index, e);
                report.failures.push(CleanupFailure {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
