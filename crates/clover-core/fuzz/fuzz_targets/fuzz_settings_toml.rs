//! Fuzz test for settings TOML parsing

#![no_main]

use libfuzzer_sys::fuzz_target;

use clover_core::{OutputSettings, ProbeConfig, ProbeSettings, Settings};

fuzz_target!(|data: &str| {
    if let Ok(settings) = toml::from_str::<Settings>(data) {
        let _ = toml::to_string_pretty(&settings);

        // Whatever the file holds, applying it must fail cleanly
        let _ = settings.probe.block_size_bytes();
        let _ = settings.probe.apply(ProbeConfig::new("/tmp", 1_000_000));
    }

    let _: Result<ProbeSettings, _> = toml::from_str(data);
    let _: Result<OutputSettings, _> = toml::from_str(data);

    let wrapped = format!("[probe]\n{}", data);
    let _: Result<Settings, _> = toml::from_str(&wrapped);

    let wrapped = format!("[output]\n{}", data);
    let _: Result<Settings, _> = toml::from_str(&wrapped);
});
