//! Fuzz target: `Record::decode`
//!
//! Feeds arbitrary slot images to the decoder.  It must never panic, and
//! any record it accepts must re-encode to the same checksummed bytes.
//!
//! cargo fuzz run fuzz_record_decode

#![no_main]

use chamber::storage::record::{CRC_COVERED, Record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(rec) = Record::decode(data) {
        let image = rec.encode();
        assert_eq!(image[..=CRC_COVERED], data[..=CRC_COVERED]);
    }
});
