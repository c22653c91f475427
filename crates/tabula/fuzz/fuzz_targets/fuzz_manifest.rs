//! Fuzz target for remote catalog manifests.
//!
//! Parsing must never panic, and every accepted entry must belong to one of
//! the requested channels.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabula::catalog::Manifest;

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    if let Ok(json) = std::str::from_utf8(data) {
        let channels = vec!["garden".to_string()];
        if let Ok(entries) = Manifest::parse(json, &channels, None) {
            assert!(entries.iter().all(|e| e.channel == "garden"));
        }
    }
});
