//! Raw column values and their typed decoding.
//!
//! The replication stream delivers primary-key columns in text encoding,
//! tagged with the column's kind. [`SqlValue::build`] turns one such raw
//! value into a typed value, failing per value when the bytes do not match
//! the declared kind.

use crate::DecodeError;
use serde::{Deserialize, Serialize};

/// Declared kind of a replicated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Signed integer (TINYINT..BIGINT)
    Int,
    /// Unsigned integer (... UNSIGNED)
    UnsignedInt,
    /// FLOAT / DOUBLE
    Float,
    /// DECIMAL / NUMERIC, kept as its literal text
    Decimal,
    /// CHAR / VARCHAR / TEXT
    Text,
    /// BINARY / VARBINARY / BLOB
    Binary,
}

/// A raw column value as it arrives from the replication stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValue {
    pub kind: ColumnKind,
    /// Text-encoded bytes, `None` for SQL NULL.
    pub data: Option<Vec<u8>>,
}

impl RawValue {
    pub fn new(kind: ColumnKind, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: Some(data.into()),
        }
    }

    pub fn null(kind: ColumnKind) -> Self {
        Self { kind, data: None }
    }

    pub fn int(value: i64) -> Self {
        Self::new(ColumnKind::Int, value.to_string())
    }

    pub fn unsigned(value: u64) -> Self {
        Self::new(ColumnKind::UnsignedInt, value.to_string())
    }

    pub fn text(value: &str) -> Self {
        Self::new(ColumnKind::Text, value)
    }

    pub fn binary(value: &[u8]) -> Self {
        Self::new(ColumnKind::Binary, value)
    }
}

/// A decoded, typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integral(i64),
    Unsigned(u64),
    Fractional(f64),
    Decimal(String),
    Text(String),
    Binary(Vec<u8>),
}

impl SqlValue {
    /// Decode a raw column value according to its declared kind.
    pub fn build(raw: &RawValue) -> Result<Self, DecodeError> {
        let Some(data) = raw.data.as_deref() else {
            return Ok(SqlValue::Null);
        };

        match raw.kind {
            ColumnKind::Int => {
                let text = ascii(raw.kind, data)?;
                text.parse::<i64>()
                    .map(SqlValue::Integral)
                    .map_err(|e| DecodeError::InvalidNumber {
                        kind: raw.kind,
                        value: text.to_string(),
                        reason: e.to_string(),
                    })
            }
            ColumnKind::UnsignedInt => {
                let text = ascii(raw.kind, data)?;
                text.parse::<u64>()
                    .map(SqlValue::Unsigned)
                    .map_err(|e| DecodeError::InvalidNumber {
                        kind: raw.kind,
                        value: text.to_string(),
                        reason: e.to_string(),
                    })
            }
            ColumnKind::Float => {
                let text = ascii(raw.kind, data)?;
                let value = text
                    .parse::<f64>()
                    .map_err(|e| DecodeError::InvalidNumber {
                        kind: raw.kind,
                        value: text.to_string(),
                        reason: e.to_string(),
                    })?;
                if !value.is_finite() {
                    return Err(DecodeError::NonFinite {
                        value: text.to_string(),
                    });
                }
                Ok(SqlValue::Fractional(value))
            }
            ColumnKind::Decimal => {
                let text = ascii(raw.kind, data)?;
                if !is_decimal_literal(text) {
                    return Err(DecodeError::InvalidDecimal {
                        value: text.to_string(),
                    });
                }
                Ok(SqlValue::Decimal(text.to_string()))
            }
            ColumnKind::Text => std::str::from_utf8(data)
                .map(|s| SqlValue::Text(s.to_string()))
                .map_err(|e| DecodeError::InvalidUtf8 {
                    kind: raw.kind,
                    reason: e.to_string(),
                }),
            ColumnKind::Binary => Ok(SqlValue::Binary(data.to_vec())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

fn ascii(kind: ColumnKind, data: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(data).map_err(|e| DecodeError::InvalidUtf8 {
        kind,
        reason: e.to_string(),
    })
}

/// `[+-]digits[.digits]`, with at least one digit overall.
fn is_decimal_literal(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    !(int_part.is_empty() && frac_part.is_empty()) && digits(int_part) && digits(frac_part)
}
