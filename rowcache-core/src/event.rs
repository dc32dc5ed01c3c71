//! Change events delivered by the replication stream.

use crate::{RawValue, ReplicationPosition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a change event.
///
/// The stream tags categories with short strings (`DDL`, `DML`, `ERR`,
/// `POS`). Anything else is preserved as [`EventCategory::Unknown`] so the
/// dispatcher can report it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    /// Schema change
    Ddl,
    /// Row change with primary keys
    Dml,
    /// Statement the stream could not turn into row changes
    Error,
    /// Replication position marker
    Position,
    /// Unrecognized category tag
    Unknown(String),
}

impl EventCategory {
    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::Ddl => "DDL",
            EventCategory::Dml => "DML",
            EventCategory::Error => "ERR",
            EventCategory::Position => "POS",
            EventCategory::Unknown(tag) => tag,
        }
    }
}

impl From<String> for EventCategory {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "DDL" => EventCategory::Ddl,
            "DML" => EventCategory::Dml,
            "ERR" => EventCategory::Error,
            "POS" => EventCategory::Position,
            _ => EventCategory::Unknown(tag),
        }
    }
}

impl From<EventCategory> for String {
    fn from(category: EventCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record from the replication stream.
///
/// Only the fields relevant to `category` carry meaning; the others are left
/// empty by the source and are never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub category: EventCategory,
    /// Statement text (DDL, ERR)
    #[serde(default)]
    pub sql: String,
    /// Affected table (DML)
    #[serde(default)]
    pub table_name: String,
    /// One primary-key tuple per affected row, in primary-key column order (DML)
    #[serde(default)]
    pub pk_rows: Vec<Vec<RawValue>>,
    /// Position marker (POS)
    #[serde(default)]
    pub position: Option<ReplicationPosition>,
    /// Commit time in unix seconds
    pub timestamp: i64,
}

impl ChangeEvent {
    fn empty(category: EventCategory, timestamp: i64) -> Self {
        Self {
            category,
            sql: String::new(),
            table_name: String::new(),
            pk_rows: Vec::new(),
            position: None,
            timestamp,
        }
    }

    pub fn ddl(sql: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sql: sql.into(),
            ..Self::empty(EventCategory::Ddl, timestamp)
        }
    }

    pub fn dml(table_name: impl Into<String>, pk_rows: Vec<Vec<RawValue>>, timestamp: i64) -> Self {
        Self {
            table_name: table_name.into(),
            pk_rows,
            ..Self::empty(EventCategory::Dml, timestamp)
        }
    }

    pub fn unrecognized(sql: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sql: sql.into(),
            ..Self::empty(EventCategory::Error, timestamp)
        }
    }

    pub fn position(position: ReplicationPosition, timestamp: i64) -> Self {
        Self {
            position: Some(position),
            ..Self::empty(EventCategory::Position, timestamp)
        }
    }

    pub fn with_category(category: EventCategory, timestamp: i64) -> Self {
        Self::empty(category, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_tags() {
        for (tag, category) in [
            ("DDL", EventCategory::Ddl),
            ("DML", EventCategory::Dml),
            ("ERR", EventCategory::Error),
            ("POS", EventCategory::Position),
        ] {
            assert_eq!(EventCategory::from(tag.to_string()), category);
            assert_eq!(category.as_str(), tag);
        }
        assert_eq!(
            EventCategory::from("BOGUS".to_string()),
            EventCategory::Unknown("BOGUS".to_string())
        );
    }

    #[test]
    fn test_event_deserializes_with_missing_fields() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"category":"DDL","sql":"DROP TABLE t","timestamp":7}"#)
                .unwrap();
        assert_eq!(event, ChangeEvent::ddl("DROP TABLE t", 7));

        let event: ChangeEvent =
            serde_json::from_str(r#"{"category":"XYZ","timestamp":7}"#).unwrap();
        assert_eq!(event.category, EventCategory::Unknown("XYZ".to_string()));
    }
}
