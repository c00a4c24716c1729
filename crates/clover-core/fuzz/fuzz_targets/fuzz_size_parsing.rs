//! Fuzz test for size string parsing
//!
//! Sizes come straight from `--size`, `--block-size` and the settings file.

#![no_main]

use libfuzzer_sys::fuzz_target;

use clover_core::{parse_size, ProbeConfig};

fuzz_target!(|data: &str| {
    // Should never panic, only return Ok/Err
    if let Ok(size) = parse_size(data) {
        // A parsed size must survive config validation without panicking
        let _ = ProbeConfig::new("/tmp", size).validate();
        if let Ok(block_size) = usize::try_from(size) {
            let _ = ProbeConfig::new("/tmp", 1).block_size(block_size).validate();
        }
    }

    for suffix in ["", "B", "K", "KB", "KiB", "M", "MB", "G", "GB", "T", "k", "m", "g"] {
        let test_input = format!("{}{}", data.trim(), suffix);
        let _ = parse_size(&test_input);
    }

    let whitespace_input = format!("  {}  ", data);
    let _ = parse_size(&whitespace_input);
});
