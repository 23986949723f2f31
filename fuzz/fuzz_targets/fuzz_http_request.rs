//! Fuzz target: HTTP request-head reader
//!
//! cargo fuzz run fuzz_http_request

#![no_main]

use std::io::Cursor;
use std::time::Duration;

use chamber::web::read_request;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = read_request(&mut Cursor::new(data), Duration::from_secs(1)) {
        assert!(req.path.starts_with('/'));
        let _ = req.query_param("co2");
    }
});
