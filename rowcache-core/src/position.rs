//! Replication positions.
//!
//! A [`ReplicationPosition`] is a GTID in one of the supported server
//! flavors. The service never orders positions itself; it only stores the
//! last one seen and hands it back to the source to resume after it.

use crate::PositionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// GTID flavor of the upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GtidFlavor {
    /// `domain-server-sequence`
    MariaDb,
    /// `server-group`
    GoogleMysql,
}

impl fmt::Display for GtidFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GtidFlavor::MariaDb => write!(f, "MariaDB"),
            GtidFlavor::GoogleMysql => write!(f, "GoogleMysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum Gtid {
    MariaDb { domain: u32, server: u32, sequence: u64 },
    GoogleMysql { server: u32, group: u64 },
}

/// Opaque, resumable marker in the upstream change history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicationPosition(Gtid);

impl ReplicationPosition {
    /// Parse a GTID rendered by a server of the given flavor.
    pub fn parse(flavor: GtidFlavor, text: &str) -> Result<Self, PositionError> {
        let malformed = |reason: &str| PositionError::Malformed {
            flavor: flavor.to_string(),
            text: text.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = text.trim().split('-').collect();

        let gtid = match (flavor, parts.as_slice()) {
            (GtidFlavor::MariaDb, [domain, server, sequence]) => Gtid::MariaDb {
                domain: domain.parse().map_err(|_| malformed("invalid domain"))?,
                server: server.parse().map_err(|_| malformed("invalid server id"))?,
                sequence: sequence.parse().map_err(|_| malformed("invalid sequence"))?,
            },
            (GtidFlavor::MariaDb, _) => return Err(malformed("expected domain-server-sequence")),
            (GtidFlavor::GoogleMysql, [server, group]) => Gtid::GoogleMysql {
                server: server.parse().map_err(|_| malformed("invalid server id"))?,
                group: group.parse().map_err(|_| malformed("invalid group id"))?,
            },
            (GtidFlavor::GoogleMysql, _) => return Err(malformed("expected server-group")),
        };
        Ok(Self(gtid))
    }

    pub fn mariadb(domain: u32, server: u32, sequence: u64) -> Self {
        Self(Gtid::MariaDb {
            domain,
            server,
            sequence,
        })
    }

    pub fn google_mysql(server: u32, group: u64) -> Self {
        Self(Gtid::GoogleMysql { server, group })
    }

    pub fn flavor(&self) -> GtidFlavor {
        match self.0 {
            Gtid::MariaDb { .. } => GtidFlavor::MariaDb,
            Gtid::GoogleMysql { .. } => GtidFlavor::GoogleMysql,
        }
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Gtid::MariaDb {
                domain,
                server,
                sequence,
            } => write!(f, "{}-{}-{}", domain, server, sequence),
            Gtid::GoogleMysql { server, group } => write!(f, "{}-{}", server, group),
        }
    }
}

/// Replication status reported by the upstream server at connect time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterStatus {
    /// Current binlog file name
    pub log_file: String,
    /// Offset within `log_file`
    pub log_position: u64,
    /// GTID of the last committed transaction
    pub position: ReplicationPosition,
}
