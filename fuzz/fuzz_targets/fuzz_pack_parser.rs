//! Fuzz target for pack file parsing.
//!
//! Tests that the pack parser handles arbitrary input without panicking.

#![no_main]

use ferry_git::PackParser;
use ferry_storage::ObjectStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let store = ObjectStore::new();
    let _ = PackParser::new(data).parse(&store);
});
