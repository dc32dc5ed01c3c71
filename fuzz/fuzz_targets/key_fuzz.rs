//! Fuzz test for primary-key decoding and key building
//!
//! Feeds arbitrary bytes to every column kind and checks that decoding
//! never panics and that decoded tuples always yield the same key.
//!
//! Run with: cargo +nightly fuzz run key_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rowcache_core::{build_key, ColumnKind, RawValue, SqlValue};

const KINDS: [ColumnKind; 6] = [
    ColumnKind::Int,
    ColumnKind::UnsignedInt,
    ColumnKind::Float,
    ColumnKind::Decimal,
    ColumnKind::Text,
    ColumnKind::Binary,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };

    // Split the payload into up to three columns on 0xff bytes.
    let values: Vec<SqlValue> = payload
        .split(|b| *b == 0xff)
        .take(3)
        .enumerate()
        .filter_map(|(i, bytes)| {
            let kind = KINDS[(selector as usize + i) % KINDS.len()];
            SqlValue::build(&RawValue::new(kind, bytes)).ok()
        })
        .collect();

    let key = build_key(&values);
    assert_eq!(key, build_key(&values), "key building must be deterministic");
    if values.iter().any(SqlValue::is_null) || values.is_empty() {
        assert!(key.is_none());
    }
});
