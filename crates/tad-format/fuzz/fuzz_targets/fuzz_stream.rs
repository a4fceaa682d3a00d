//! Fuzz target for the TAD stream reader.
//!
//! Feeds arbitrary bytes to `TadStream` to find crashes, panics and hangs in
//! the record parser and the index scan. Inputs are prefixed with the TAD
//! magic to reach header validation more often.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;

use tad_format::{StreamOptions, TadStream, TAD_MAGIC};

fuzz_target!(|data: &[u8]| {
    let mut input = TAD_MAGIC.to_vec();
    input.extend_from_slice(data);

    let mut tmpfile = match tempfile::NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if tmpfile.write_all(&input).is_err() {
        return;
    }
    if tmpfile.flush().is_err() {
        return;
    }

    // Keep allocations small so oversized claims are rejected, not attempted.
    let options = StreamOptions::default().with_allocation_limit(1 << 20);
    let mut stream = TadStream::with_options(options);
    if stream.open_for_reading(tmpfile.path()).is_err() {
        return;
    }

    // Count first, then read sequentially; neither should ever panic.
    if let Ok(Some(count)) = stream.array_count() {
        for i in 0..count {
            let _ = stream.read_at(i);
        }
    }
    stream.invalidate_index();
    while let Ok(true) = stream.has_more() {
        if stream.read_next().is_err() {
            break;
        }
    }
});
