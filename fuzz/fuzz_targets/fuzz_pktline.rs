//! Fuzz target for pkt-line parsing.
//!
//! The reader must handle arbitrary input without panicking, and peeking
//! must never change what is read next.

#![no_main]

use ferry_git::PktLineReader;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(Cursor::new(data));

    // Bounded so crafted input cannot loop forever
    for _ in 0..100 {
        let peeked = match reader.peek() {
            Ok(pkt) => pkt.cloned(),
            Err(_) => break,
        };
        match reader.read() {
            Ok(Some(pkt)) => assert_eq!(Some(pkt), peeked),
            Ok(None) => break,
            Err(_) => break,
        }
    }
});
