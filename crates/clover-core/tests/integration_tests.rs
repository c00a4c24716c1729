//! Integration tests for clover-core
//!
//! These tests run the complete write/verify/cleanup pipeline against
//! temporary directories.

use clover_core::{
    block_path, cleanup, BlockGenerator, BlockStore, DirStore, Error, FailureCause,
    IntegrityStatus, PlainSink, Probe, ProbeConfig, Reporter, StopReason, Summary, Verifier,
    Writer,
};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

const MB: usize = 1_000_000;

/// Directory store that reports the device full after `limit` blocks
struct FullAfter {
    inner: DirStore,
    limit: u64,
}

impl BlockStore for FullAfter {
    type Writer = <DirStore as BlockStore>::Writer;
    type Reader = <DirStore as BlockStore>::Reader;

    fn location(&self) -> &Path {
        self.inner.location()
    }

    fn check_ready(&self) -> clover_core::Result<()> {
        self.inner.check_ready()
    }

    fn is_present(&self) -> bool {
        self.inner.is_present()
    }

    fn create(&self, index: u64) -> io::Result<Self::Writer> {
        if index > self.limit {
            return Err(io::Error::other("No space left on device"));
        }
        self.inner.create(index)
    }

    fn open(&self, index: u64) -> io::Result<Self::Reader> {
        self.inner.open(index)
    }

    fn remove(&self, index: u64) -> io::Result<()> {
        self.inner.remove(index)
    }
}

fn block_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn flip_byte(path: &Path, offset: usize) {
    let mut data = fs::read(path).unwrap();
    data[offset] ^= 0x01;
    fs::write(path, data).unwrap();
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_write_verify_cleanup_three_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());

    let mut writer = Writer::new(BlockGenerator::new(MB).unwrap());
    let written = writer.fill(&store, 3 * MB as u64).unwrap();

    assert_eq!(written.blocks_written, 3);
    assert_eq!(written.bytes_written, 3_000_000);
    assert_eq!(written.stop_reason, StopReason::TargetReached);
    assert_eq!(
        block_files(temp_dir.path()),
        vec!["cloverdata1.bin", "cloverdata2.bin", "cloverdata3.bin"]
    );
    for index in 1..=3 {
        let len = fs::metadata(block_path(temp_dir.path(), index)).unwrap().len();
        assert_eq!(len, MB as u64);
    }

    let verified = Verifier::new(MB).verify(&store, 3).unwrap();
    assert!(verified.passed());

    let report = cleanup(&store, false, 3);
    assert_eq!(report.removed, 3);
    assert!(block_files(temp_dir.path()).is_empty());
}

#[test]
fn test_probe_run_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let config = ProbeConfig::new(temp_dir.path(), 3_000_000).block_size(MB);

    let run = Probe::with_config(config).run().unwrap();

    assert_eq!(run.blocks_written, 3);
    assert_eq!(run.bytes_written, 3_000_000);
    assert_eq!(run.percentage(), 100.0);
    assert_eq!(run.integrity, IntegrityStatus::Passed);
    assert_eq!(run.first_failed_index(), None);
    assert!(block_files(temp_dir.path()).is_empty());
}

// ============================================================================
// Writer
// ============================================================================

#[test]
fn test_capacity_truncation_never_writes_partial_block() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());

    let result = Writer::new(BlockGenerator::new(MB).unwrap())
        .fill(&store, 2_500_000)
        .unwrap();

    assert_eq!(result.blocks_written, 2);
    assert_eq!(result.bytes_written, 2_000_000);
    assert!(!block_path(temp_dir.path(), 3).exists());
}

#[test]
fn test_device_full_stops_writer() {
    let temp_dir = TempDir::new().unwrap();
    let store = FullAfter {
        inner: DirStore::new(temp_dir.path()),
        limit: 2,
    };

    let result = Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 10 * 4096)
        .unwrap();

    assert_eq!(result.blocks_written, 2);
    assert!(matches!(
        result.stop_reason,
        StopReason::CapacityReached { index: 3, .. }
    ));
    assert_eq!(block_files(temp_dir.path()).len(), 2);
}

#[test]
fn test_sync_mode_writes_same_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path()).sync(true);
    let generator = BlockGenerator::new(8192).unwrap();

    Writer::new(generator).fill(&store, 2 * 8192).unwrap();

    let (expected, _) = generator.block(2);
    assert_eq!(fs::read(block_path(temp_dir.path(), 2)).unwrap(), expected);
}

#[test]
fn test_missing_location_rejected_without_io() {
    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("not-mounted");

    let result = Probe::with_config(ProbeConfig::new(&location, 1_000_000)).run();

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(!location.exists());
}

#[test]
fn test_zero_size_rejected_without_io() {
    let temp_dir = TempDir::new().unwrap();
    let result = Probe::with_config(ProbeConfig::new(temp_dir.path(), 0)).run();

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(block_files(temp_dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_unwritable_location_rejected_not_passed() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("locked");
    fs::create_dir(&location).unwrap();
    fs::set_permissions(&location, fs::Permissions::from_mode(0o644)).unwrap();

    let writable = fs::File::create(location.join("x")).is_ok();
    let config = ProbeConfig::new(&location, 3 * 4096).block_size(4096);
    let result = Probe::with_config(config).run();
    fs::set_permissions(&location, fs::Permissions::from_mode(0o755)).unwrap();

    if writable {
        // Running as root, permissions are not enforced
        return;
    }
    // A device that accepts nothing must not be reported as a clean run
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(block_files(&location).is_empty());
}

// ============================================================================
// Verifier
// ============================================================================

#[test]
fn test_generated_blocks_are_deterministic_across_generators() {
    let a = BlockGenerator::new(MB).unwrap();
    let b = BlockGenerator::new(MB).unwrap();
    assert_eq!(a.generate(42), b.generate(42));
    assert_eq!(a.block(7), b.block(7));
}

#[test]
fn test_corruption_in_random_half_detected() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());
    Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 4 * 4096)
        .unwrap();

    flip_byte(&block_path(temp_dir.path(), 2), 4000);
    flip_byte(&block_path(temp_dir.path(), 3), 4000);

    let result = Verifier::new(4096).verify(&store, 4).unwrap();

    assert!(!result.passed());
    assert_eq!(result.first_failed_index(), Some(2));
    assert_eq!(result.blocks_verified, 1);
}

#[test]
fn test_corruption_in_zero_half_detected() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());
    Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 3 * 4096)
        .unwrap();

    flip_byte(&block_path(temp_dir.path(), 3), 100);

    let result = Verifier::new(4096).verify(&store, 3).unwrap();
    assert_eq!(result.first_failed_index(), Some(3));
}

#[test]
fn test_truncated_file_detected() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());
    Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 2 * 4096)
        .unwrap();

    let path = block_path(temp_dir.path(), 1);
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..2048]).unwrap();

    let result = Verifier::new(4096).verify(&store, 2).unwrap();
    let failure = result.failure.unwrap();
    assert_eq!(failure.index, 1);
    assert!(matches!(failure.cause, FailureCause::Truncated { .. }));
}

#[test]
fn test_destination_lost_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let location = temp_dir.path().join("card");
    fs::create_dir(&location).unwrap();
    let store = DirStore::new(&location);

    Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 2 * 4096)
        .unwrap();
    fs::remove_dir_all(&location).unwrap();

    let result = Verifier::new(4096).verify(&store, 2);
    assert!(matches!(result, Err(Error::DestinationLost(_))));
}

// ============================================================================
// Cleanup
// ============================================================================

#[test]
fn test_keep_files_leaves_content_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let config = ProbeConfig::new(temp_dir.path(), 3 * 4096)
        .block_size(4096)
        .keep_files(true);

    let run = Probe::with_config(config).run().unwrap();
    assert_eq!(run.cleanup.kept, 3);

    let generator = BlockGenerator::new(4096).unwrap();
    for index in 1..=3 {
        let (expected, _) = generator.block(index);
        assert_eq!(fs::read(block_path(temp_dir.path(), index)).unwrap(), expected);
    }
}

#[test]
fn test_cleanup_leaves_unrelated_files() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("photo.jpg"), b"keep me").unwrap();

    let config = ProbeConfig::new(temp_dir.path(), 2 * 4096).block_size(4096);
    Probe::with_config(config).run().unwrap();

    assert_eq!(block_files(temp_dir.path()), vec!["photo.jpg"]);
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn test_nothing_written_reports_zero_percent() {
    let temp_dir = TempDir::new().unwrap();
    let store = FullAfter {
        inner: DirStore::new(temp_dir.path()),
        limit: 0,
    };
    let config = ProbeConfig::new(temp_dir.path(), 3 * 4096).block_size(4096);

    let run = Probe::with_config(config)
        .run_with_store(&store)
        .unwrap();

    assert_eq!(run.bytes_written, 0);
    assert_eq!(run.percentage(), 0.0);

    let mut reporter = Reporter::new(PlainSink::new(Vec::new()));
    reporter
        .report(&Summary::from_run(&run, temp_dir.path()))
        .unwrap();
    let text = String::from_utf8(reporter.into_sink().into_inner()).unwrap();

    assert!(text.contains("Managed to write 0/12288 (0%) bytes"));
    assert!(text.contains("Device stopped accepting data after 0 blocks"));
}

#[test]
fn test_summary_json_for_failed_run() {
    let temp_dir = TempDir::new().unwrap();
    let store = DirStore::new(temp_dir.path());
    Writer::new(BlockGenerator::new(4096).unwrap())
        .fill(&store, 2 * 4096)
        .unwrap();
    fs::remove_file(block_path(temp_dir.path(), 2)).unwrap();

    let verification = Verifier::new(4096).verify(&store, 2).unwrap();
    let write = clover_core::WriteResult {
        blocks_written: 2,
        bytes_written: 2 * 4096,
        block_size: 4096,
        target_bytes: 2 * 4096,
        elapsed: std::time::Duration::from_millis(5),
        average_speed: 0,
        stop_reason: StopReason::TargetReached,
    };
    let run = clover_core::RunResult::new(write, Some(verification), cleanup(&store, false, 2));

    let json = serde_json::to_value(Summary::from_run(&run, temp_dir.path())).unwrap();
    assert_eq!(json["integrity"], "FAILED");
    assert_eq!(json["first_failed_index"], 2);
    assert_eq!(json["files_removed"], 1);
    assert_eq!(json["cleanup_failures"], serde_json::json!([2]));
}
