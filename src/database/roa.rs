//! ROA repository for the route-visibility store
//!
//! Storage and containment queries for Route Origin Authorization entries.
//! An entry authorizes an origin AS to announce prefixes inside its range up
//! to a maximum length. Validation is a pure range query: an announcement
//! `P` from AS `A` is authorized iff some entry's range fully covers `P`,
//! names `A`, and allows `P`'s length.

use anyhow::{anyhow, Result};
use ipnet::IpNet;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::database::topology::net_to_blobs;
use crate::error::QueryError;

/// Default maximum authorized length for IPv4 entries without an override
pub const DEFAULT_MAX_LENGTH_V4: u8 = 29;
/// Default maximum authorized length for IPv6 entries without an override
pub const DEFAULT_MAX_LENGTH_V6: u8 = 64;

/// A Route Origin Authorization entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoaEntry {
    pub prefix: IpNet,
    pub max_length: u8,
    pub asn: u32,
}

impl RoaEntry {
    /// Build an entry, applying the default-max-length rule
    ///
    /// The effective maximum length is the explicit override when given,
    /// otherwise the family default, and in either case never smaller than
    /// the entry's own prefix length.
    pub fn new(prefix: IpNet, asn: u32, max_length: Option<u8>) -> Self {
        let family_default = match prefix {
            IpNet::V4(_) => DEFAULT_MAX_LENGTH_V4,
            IpNet::V6(_) => DEFAULT_MAX_LENGTH_V6,
        };
        let max_length = max_length.unwrap_or(family_default).max(prefix.prefix_len());
        Self {
            prefix,
            max_length,
            asn,
        }
    }
}

/// One authorizing entry in a `valid_origins` result
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoaMatch {
    pub roa_cidr: String,
    pub max_length: u8,
}

/// Repository for ROA data operations
pub struct RoaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RoaRepository<'a> {
    /// Create a new ROA repository
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a ROA entry; an identical entry is left untouched
    pub fn insert_entry(&self, entry: &RoaEntry) -> Result<()> {
        let (network, broadcast, length) = net_to_blobs(&entry.prefix);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO roa_entries (network, length, broadcast, max_length, asn)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![network, length, broadcast, entry.max_length, entry.asn],
            )
            .map_err(|e| anyhow!("Failed to insert ROA entry for {}: {}", entry.prefix, e))?;
        Ok(())
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<u64, QueryError> {
        let count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM roa_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Whether some entry authorizes the AS to originate the prefix
    ///
    /// True iff an entry's range fully covers the announced prefix
    /// (entry network <= prefix network and entry broadcast >= prefix
    /// broadcast, within the same address family), the entry names the AS,
    /// and the entry's max-length admits the announced prefix length.
    pub fn is_authorized(&self, prefix: &IpNet, asn: u32) -> Result<bool, QueryError> {
        let (network, broadcast, length) = net_to_blobs(prefix);
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM roa_entries
             WHERE network <= ?1 AND broadcast >= ?2 AND length(network) = ?3
               AND asn = ?4 AND max_length >= ?5",
            params![network, broadcast, network.len() as i64, asn, length],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All entries that would authorize some origin for the prefix,
    /// grouped by the authorized ASN
    pub fn valid_origins(
        &self,
        prefix: &IpNet,
    ) -> Result<BTreeMap<u32, BTreeSet<RoaMatch>>, QueryError> {
        let (network, broadcast, length) = net_to_blobs(prefix);
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT network, length, max_length, asn FROM roa_entries
             WHERE network <= ?1 AND broadcast >= ?2 AND length(network) = ?3
               AND max_length >= ?4
             ORDER BY length DESC",
        )?;
        let rows = stmt
            .query_map(
                params![network, broadcast, network.len() as i64, length],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, u8>(1)?,
                        row.get::<_, u8>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut grouped: BTreeMap<u32, BTreeSet<RoaMatch>> = BTreeMap::new();
        for (entry_network, entry_length, max_length, asn) in rows {
            let roa_cidr = super::topology::blob_to_net(&entry_network, entry_length)
                .map_err(|e| QueryError::InvalidArgument(e.to_string()))?
                .to_string();
            grouped.entry(asn).or_default().insert(RoaMatch {
                roa_cidr,
                max_length,
            });
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::SchemaManager;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        SchemaManager::new(&conn).initialize().unwrap();
        conn
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_max_length_rules() {
        let entry = RoaEntry::new(net("10.0.0.0/24"), 300, None);
        assert_eq!(entry.max_length, 29);

        let entry = RoaEntry::new(net("fd00::/32"), 300, None);
        assert_eq!(entry.max_length, 64);

        let entry = RoaEntry::new(net("10.0.0.0/24"), 300, Some(26));
        assert_eq!(entry.max_length, 26);

        // never below the entry's own length
        let entry = RoaEntry::new(net("10.0.0.0/30"), 300, None);
        assert_eq!(entry.max_length, 30);
        let entry = RoaEntry::new(net("10.0.0.0/28"), 300, Some(24));
        assert_eq!(entry.max_length, 28);
    }

    #[test]
    fn test_is_authorized_boundaries() {
        let conn = create_test_db();
        let repo = RoaRepository::new(&conn);

        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/23"), 300, Some(24)))
            .unwrap();

        // covered, allowed length, right ASN
        assert!(repo.is_authorized(&net("10.0.0.0/24"), 300).unwrap());
        assert!(repo.is_authorized(&net("10.0.0.0/23"), 300).unwrap());
        assert!(repo.is_authorized(&net("10.0.1.0/24"), 300).unwrap());

        // more specific than max-length allows
        assert!(!repo.is_authorized(&net("10.0.0.0/25"), 300).unwrap());

        // wrong origin
        assert!(!repo.is_authorized(&net("10.0.0.0/24"), 999).unwrap());

        // outside the covered range
        assert!(!repo.is_authorized(&net("10.0.2.0/24"), 300).unwrap());

        // wider than the entry (entry does not cover the whole /22)
        assert!(!repo.is_authorized(&net("10.0.0.0/22"), 300).unwrap());
    }

    #[test]
    fn test_is_authorized_family_scoped() {
        let conn = create_test_db();
        let repo = RoaRepository::new(&conn);

        repo.insert_entry(&RoaEntry::new(net("fd00::/32"), 300, Some(48)))
            .unwrap();

        assert!(repo.is_authorized(&net("fd00::/40"), 300).unwrap());
        assert!(!repo.is_authorized(&net("10.0.0.0/24"), 300).unwrap());
    }

    #[test]
    fn test_is_authorized_multiple_entries() {
        let conn = create_test_db();
        let repo = RoaRepository::new(&conn);

        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/23"), 300, Some(23)))
            .unwrap();
        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/16"), 300, Some(24)))
            .unwrap();

        // rejected by the /23 entry but admitted by the /16 one
        assert!(repo.is_authorized(&net("10.0.0.0/24"), 300).unwrap());
    }

    #[test]
    fn test_valid_origins_grouping() {
        let conn = create_test_db();
        let repo = RoaRepository::new(&conn);

        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/23"), 300, Some(24)))
            .unwrap();
        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/16"), 300, Some(24)))
            .unwrap();
        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/16"), 400, Some(24)))
            .unwrap();
        // max-length excludes this one for a /24 announcement
        repo.insert_entry(&RoaEntry::new(net("10.0.0.0/16"), 500, Some(20)))
            .unwrap();

        let origins = repo.valid_origins(&net("10.0.0.0/24")).unwrap();
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[&300].len(), 2);
        assert_eq!(origins[&400].len(), 1);
        assert!(!origins.contains_key(&500));

        let m = origins[&400].iter().next().unwrap();
        assert_eq!(m.roa_cidr, "10.0.0.0/16");
        assert_eq!(m.max_length, 24);
    }

    #[test]
    fn test_valid_origins_empty() {
        let conn = create_test_db();
        let repo = RoaRepository::new(&conn);

        assert!(repo.valid_origins(&net("10.0.0.0/24")).unwrap().is_empty());
    }
}
