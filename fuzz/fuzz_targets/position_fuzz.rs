//! Fuzz test for replication position parsing
//!
//! Parsing arbitrary text must return Ok or Err without panicking, and any
//! accepted position must render back to text that parses to itself.
//!
//! Run with: cargo +nightly fuzz run position_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rowcache_core::{GtidFlavor, ReplicationPosition};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for flavor in [GtidFlavor::MariaDb, GtidFlavor::GoogleMysql] {
            if let Ok(position) = ReplicationPosition::parse(flavor, input) {
                assert_eq!(position.flavor(), flavor);
                let reparsed = ReplicationPosition::parse(flavor, &position.to_string());
                assert_eq!(reparsed.ok(), Some(position));
            }
        }
    }
});
