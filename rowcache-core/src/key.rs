//! Invalidation keys built from primary-key tuples.
//!
//! A key is the canonical rendering of each primary-key value joined by
//! [`KEY_SEPARATOR`]. Text and binary values are base64 encoded and numbers
//! are rendered in decimal, so no rendering can contain the separator and two
//! distinct tuples of the same column types never share a key.

use crate::SqlValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Separator placed between rendered column values (ASCII unit separator).
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Cache key identifying one row of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvalidationKey(String);

impl InvalidationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for InvalidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InvalidationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the invalidation key for one primary-key tuple.
///
/// Returns `None` when the tuple cannot identify a row: it is empty, one of
/// its values is NULL, or it renders to an empty string (a lone empty text or
/// binary value). Callers skip such rows.
pub fn build_key(values: &[SqlValue]) -> Option<InvalidationKey> {
    if values.is_empty() {
        return None;
    }

    let mut key = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        match value {
            SqlValue::Null => return None,
            SqlValue::Integral(n) => key.push_str(&n.to_string()),
            SqlValue::Unsigned(n) => key.push_str(&n.to_string()),
            SqlValue::Fractional(f) => key.push_str(&f.to_string()),
            SqlValue::Decimal(d) => key.push_str(d),
            SqlValue::Text(s) => STANDARD.encode_string(s.as_bytes(), &mut key),
            SqlValue::Binary(b) => STANDARD.encode_string(b, &mut key),
        }
    }
    if key.is_empty() {
        return None;
    }
    Some(InvalidationKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(values: &[SqlValue]) -> String {
        build_key(values).map(InvalidationKey::into_string).unwrap_or_default()
    }

    #[test]
    fn test_empty_tuple_has_no_key() {
        assert_eq!(build_key(&[]), None);
    }

    #[test]
    fn test_null_value_has_no_key() {
        assert_eq!(build_key(&[SqlValue::Integral(1), SqlValue::Null]), None);
    }

    #[test]
    fn test_empty_rendering_has_no_key() {
        assert_eq!(build_key(&[SqlValue::Text(String::new())]), None);
        assert_eq!(build_key(&[SqlValue::Binary(Vec::new())]), None);
        assert_eq!(
            key(&[SqlValue::Text(String::new()), SqlValue::Text(String::new())]),
            "\u{1f}"
        );
    }

    #[test]
    fn test_single_integer() {
        assert_eq!(key(&[SqlValue::Integral(1)]), "1");
        assert_eq!(key(&[SqlValue::Unsigned(18446744073709551615)]), "18446744073709551615");
    }

    #[test]
    fn test_composite_key_uses_separator() {
        let k = key(&[SqlValue::Integral(7), SqlValue::Text("ab".to_string())]);
        assert_eq!(k, "7\u{1f}YWI=");
    }

    #[test]
    fn test_separator_inside_text_does_not_collide() {
        let joined = key(&[SqlValue::Text("a\u{1f}b".to_string())]);
        let split = key(&[SqlValue::Text("a".to_string()), SqlValue::Text("b".to_string())]);
        assert_ne!(joined, split);
        assert!(!joined.contains(KEY_SEPARATOR));
    }

    #[test]
    fn test_deterministic() {
        let tuple = vec![
            SqlValue::Decimal("10.50".to_string()),
            SqlValue::Binary(vec![0, 1, 2]),
            SqlValue::Fractional(0.25),
        ];
        assert_eq!(build_key(&tuple), build_key(&tuple.clone()));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Strings drawn from an alphabet that includes the separator.
    fn text_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec(prop_oneof![Just('a'), Just('b'), Just('\u{1f}'), Just('.')], 0..6)
            .prop_map(|chars| chars.into_iter().collect())
    }

    fn text_tuple() -> impl Strategy<Value = Vec<SqlValue>> {
        proptest::collection::vec(text_strategy().prop_map(SqlValue::Text), 1..4)
    }

    fn int_tuple() -> impl Strategy<Value = Vec<SqlValue>> {
        proptest::collection::vec(any::<i64>().prop_map(SqlValue::Integral), 1..4)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// No tuple ever yields an empty key.
        #[test]
        fn prop_key_is_never_empty(tuple in text_tuple()) {
            if let Some(key) = build_key(&tuple) {
                prop_assert!(!key.as_str().is_empty());
            }
        }

        /// Equal tuples always produce equal keys.
        #[test]
        fn prop_key_is_deterministic(tuple in text_tuple()) {
            prop_assert_eq!(build_key(&tuple), build_key(&tuple.clone()));
        }

        /// Distinct text tuples never share a key, even when the text
        /// contains the separator.
        #[test]
        fn prop_text_keys_are_injective(a in text_tuple(), b in text_tuple()) {
            let (ka, kb) = (build_key(&a), build_key(&b));
            if a == b {
                prop_assert_eq!(ka, kb);
            } else {
                prop_assert_ne!(ka, kb);
            }
        }

        /// Distinct integer tuples never share a key.
        #[test]
        fn prop_int_keys_are_injective(a in int_tuple(), b in int_tuple()) {
            if a != b {
                prop_assert_ne!(build_key(&a), build_key(&b));
            }
        }
    }
}
