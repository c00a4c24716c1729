//! Fuzz test for embedded checksum handling
//!
//! Arbitrary bytes read back from a device must never panic the checker, and
//! any buffer that has been sealed must check out.

#![no_main]

use libfuzzer_sys::fuzz_target;

use clover_core::block::{checksums_match, embed, extract, CHECKSUM_LEN};

fuzz_target!(|data: &[u8]| {
    if data.len() < CHECKSUM_LEN {
        return;
    }

    let mut read_back = data.to_vec();
    let (stored, computed) = extract(&mut read_back);
    assert_eq!(
        checksums_match(&stored, &computed),
        stored == computed,
        "XOR comparison must agree with equality"
    );

    let mut sealed = data.to_vec();
    sealed[..CHECKSUM_LEN].fill(0);
    embed(&mut sealed);
    let (stored, computed) = extract(&mut sealed);
    assert!(checksums_match(&stored, &computed));
});
