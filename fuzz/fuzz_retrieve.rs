//! Fuzz target for query tokenization, scoring, and excerpt packing.
//!
//! Run with: cargo +nightly fuzz run fuzz_retrieve
//!
//! Splits the input into a query and a file preview, retrieves against a
//! one-file index, and checks the character budget holds. Multi-byte
//! previews exercise the character-based truncation paths.

#![no_main]

use std::collections::BTreeMap;

use clawctx_core::IndexedFile;
use clawctx_core::context::retrieve;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let budget = usize::from(u16::from_le_bytes([data[0], data[1]])).max(1);
    let split = (data[2] as usize % (data.len() - 2)) + 3;
    let query = String::from_utf8_lossy(&data[3..split.min(data.len())]);
    let preview = String::from_utf8_lossy(&data[split.min(data.len())..]);

    let file = IndexedFile {
        path: "fuzz/input.txt".to_string(),
        mtime_ns: 0,
        size: preview.len() as u64,
        symbols: Vec::new(),
        preview: preview.into_owned(),
    };
    let files = BTreeMap::from([(file.path.clone(), file)]);

    if let Ok(pack) = retrieve("fuzz", &query, &files, 3, budget) {
        assert!(pack.excerpt_chars() <= budget);
    }
});
