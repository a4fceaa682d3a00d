//! Fuzz target for tag-list decoding.
//!
//! Any body that decodes must re-encode to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tad_format::TagList;

fuzz_target!(|data: &[u8]| {
    if let Ok(tags) = TagList::decode_body(data) {
        let encoded = tags.to_bytes();
        assert_eq!(&encoded[8..], data);
    }
});
