//! Ingestion pipeline
//!
//! Turns decoded route announcements and registry lookups into the
//! relational topology model. One `Ingestor::run` is a single-writer batch
//! job: every insert happens inside one transaction, so readers either see
//! the complete run or none of it.
//!
//! Derivation rules per announcement:
//! - the feed ASN is upserted as a direct collector peer,
//! - the AS-path is deduplicated by content digest and its hop ASNs
//!   upserted,
//! - every adjacent hop pair becomes a directed adjacency, flagged as
//!   transit evidence when the sending hop is not the path's origin,
//! - the prefix↔path association and the origin association are recorded.

pub mod announcement;
pub mod mrt;
pub mod registry;

pub use announcement::{parse_path_tokens, Announcement, PathTokenError};
pub use mrt::MrtSource;
pub use registry::{read_fields, Registry, RoaObject};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::roa::RoaEntry;
use crate::database::schema::SchemaManager;
use crate::database::{PeriscopeDatabase, RoaRepository, TopologyRepository};

/// Outcome counters of one ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Announcement records processed
    pub announcements: u64,
    /// Records dropped because of a path-digest collision
    pub skipped_paths: u64,
    /// Distinct ASNs in the store after the run
    pub asns: u64,
    /// Distinct prefixes in the store after the run
    pub prefixes: u64,
    /// Distinct AS-paths in the store after the run
    pub paths: u64,
    /// ROA entries in the store after the run
    pub roa_entries: u64,
    /// AS names resolved from the registry
    pub names_resolved: u64,
}

/// Single-writer batch ingestion over a topology store
pub struct Ingestor<'a> {
    db: &'a PeriscopeDatabase,
}

impl<'a> Ingestor<'a> {
    /// Create an ingestor over the given store
    pub fn new(db: &'a PeriscopeDatabase) -> Self {
        Self { db }
    }

    /// Run a full ingestion pass
    ///
    /// Consumes every announcement, then (when a registry is supplied) the
    /// ROA sub-pipeline and AS-name resolution. The store is updated in one
    /// transaction: any fatal error rolls the whole run back.
    pub fn run<I>(&self, announcements: I, registry: Option<&Registry>) -> Result<IngestStats>
    where
        I: IntoIterator<Item = Announcement>,
    {
        let tx = self
            .db
            .connection()
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin ingestion transaction: {}", e))?;

        let mut stats = IngestStats::default();

        {
            let topology = TopologyRepository::new(&tx);
            let roa = RoaRepository::new(&tx);

            for announcement in announcements {
                self.ingest_announcement(&topology, &announcement, &mut stats)?;
            }

            if let Some(registry) = registry {
                for object in registry.roa_objects()? {
                    for origin in &object.origins {
                        roa.insert_entry(&RoaEntry::new(
                            object.prefix,
                            *origin,
                            object.max_length,
                        ))?;
                    }
                }

                for asn in topology.all_asns()? {
                    if let Some(name) = registry.as_name(asn) {
                        topology.set_asn_name(asn, &name)?;
                        stats.names_resolved += 1;
                    }
                }
            }

            stats.asns = count(&tx, "asns")?;
            stats.prefixes = count(&tx, "prefixes")?;
            stats.paths = tx
                .query_row("SELECT COUNT(DISTINCT path_id) FROM path_hops", [], |row| {
                    row.get(0)
                })
                .map_err(|e| anyhow!("Failed to count paths: {}", e))?;
            stats.roa_entries = count(&tx, "roa_entries")?;

            SchemaManager::new(&tx).set_meta("last_ingest_at", &Utc::now().timestamp().to_string())?;
        }

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit ingestion run: {}", e))?;

        info!(
            "ingested {} announcements: {} ASNs, {} prefixes, {} paths, {} ROA entries",
            stats.announcements, stats.asns, stats.prefixes, stats.paths, stats.roa_entries
        );

        Ok(stats)
    }

    fn ingest_announcement(
        &self,
        topology: &TopologyRepository<'_>,
        announcement: &Announcement,
        stats: &mut IngestStats,
    ) -> Result<()> {
        let Some(&origin) = announcement.hops.last() else {
            warn!("skipping announcement for {}: empty path", announcement.prefix);
            return Ok(());
        };

        stats.announcements += 1;

        topology.upsert_asn(announcement.feed_asn, true, None)?;

        let prefix = announcement.prefix.trunc();
        topology.insert_prefix(&prefix)?;

        for &asn in &announcement.hops {
            topology.upsert_asn(asn, false, None)?;
        }

        let Some(path_id) = topology.insert_path(&announcement.hops)? else {
            stats.skipped_paths += 1;
            return Ok(());
        };

        for pair in announcement.hops.windows(2) {
            let (previous, current) = (pair[0], pair[1]);
            if previous == current {
                continue;
            }
            // the current hop forwards a prefix it does not originate: that
            // is transit evidence towards the hop before it
            topology.upsert_neighbour(previous, current, current != origin)?;
        }

        topology.link_prefix_path(&prefix, path_id)?;
        topology.record_origin(origin, &prefix)?;

        Ok(())
    }
}

fn count(conn: &rusqlite::Connection, table: &str) -> Result<u64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .map_err(|e| anyhow!("Failed to count {}: {}", table, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::IpNet;
    use std::fs;
    use std::path::Path;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn ann(feed: u32, prefix: &str, hops: &[u32]) -> Announcement {
        Announcement {
            feed_asn: feed,
            prefix: net(prefix),
            hops: hops.to_vec(),
        }
    }

    #[test]
    fn test_basic_run() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let stats = Ingestor::new(&db)
            .run(
                vec![
                    ann(100, "10.0.0.0/24", &[100, 200, 300]),
                    ann(100, "10.0.0.0/24", &[100, 250, 300]),
                ],
                None,
            )
            .unwrap();

        assert_eq!(stats.announcements, 2);
        assert_eq!(stats.asns, 4);
        assert_eq!(stats.prefixes, 1);
        assert_eq!(stats.paths, 2);
        assert_eq!(stats.skipped_paths, 0);

        let topology = db.topology();
        assert!(topology.is_direct_feed(100).unwrap());
        assert!(!topology.is_direct_feed(200).unwrap());

        let mut origins = topology.origin_asns(&net("10.0.0.0/24")).unwrap();
        origins.sort_unstable();
        assert_eq!(origins, vec![300]);
    }

    #[test]
    fn test_transit_derivation() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        Ingestor::new(&db)
            .run(vec![ann(100, "10.0.0.0/24", &[100, 200, 300])], None)
            .unwrap();

        let transit_of = |receiver: u32, sender: u32| -> bool {
            db.connection()
                .query_row(
                    "SELECT transit FROM neighbours WHERE receiver_asn = ?1 AND sender_asn = ?2",
                    [receiver, sender],
                    |row| row.get(0),
                )
                .unwrap()
        };

        // 200 forwarded 300's prefix to 100: transit evidence for 200
        assert!(transit_of(100, 200));
        // 300 announced its own prefix to 200: no transit evidence
        assert!(!transit_of(200, 300));
    }

    #[test]
    fn test_transit_flag_stays_set() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        // first path shows 200 transiting towards 100; the second only shows
        // it announcing its own prefix
        Ingestor::new(&db)
            .run(
                vec![
                    ann(100, "10.0.0.0/24", &[100, 200, 300]),
                    ann(100, "10.1.0.0/24", &[100, 200]),
                ],
                None,
            )
            .unwrap();

        let transit: bool = db
            .connection()
            .query_row(
                "SELECT transit FROM neighbours WHERE receiver_asn = 100 AND sender_asn = 200",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(transit);
    }

    #[test]
    fn test_self_loop_hops_skipped() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        // prepended path: 200 appears twice in a row
        Ingestor::new(&db)
            .run(vec![ann(100, "10.0.0.0/24", &[100, 200, 200, 300])], None)
            .unwrap();

        let self_loops: u32 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM neighbours WHERE receiver_asn = sender_asn",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(self_loops, 0);
    }

    #[test]
    fn test_duplicate_paths_collapse() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let stats = Ingestor::new(&db)
            .run(
                vec![
                    ann(100, "10.0.0.0/24", &[100, 200, 300]),
                    ann(100, "10.1.0.0/24", &[100, 200, 300]),
                ],
                None,
            )
            .unwrap();

        // one stored path, linked to two prefixes
        assert_eq!(stats.paths, 1);
        let links: u32 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM prefix_paths", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 2);
    }

    #[test]
    fn test_feed_flag_not_downgraded_by_hop() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        Ingestor::new(&db)
            .run(
                vec![
                    ann(100, "10.0.0.0/24", &[100, 200]),
                    // 100 also appears as a mid-path hop elsewhere
                    ann(300, "10.1.0.0/24", &[300, 100, 200]),
                ],
                None,
            )
            .unwrap();

        assert!(db.topology().is_direct_feed(100).unwrap());
    }

    fn write_registry_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_registry_sub_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        write_registry_file(
            dir.path(),
            "data/route/10.0.0.0_23",
            "route: 10.0.0.0/23\norigin: AS300\nmax-length: 24\n",
        );
        fs::create_dir_all(dir.path().join("data/route6")).unwrap();
        write_registry_file(
            dir.path(),
            "data/aut-num/AS300",
            "aut-num: AS300\nas-name: ORIGIN-AS\n",
        );

        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let registry = Registry::new(dir.path());
        let stats = Ingestor::new(&db)
            .run(
                vec![ann(100, "10.0.0.0/24", &[100, 300])],
                Some(&registry),
            )
            .unwrap();

        assert_eq!(stats.roa_entries, 1);
        assert_eq!(stats.names_resolved, 1);

        assert!(db.roa().is_authorized(&net("10.0.0.0/24"), 300).unwrap());
        assert_eq!(
            db.topology().asn_name(300).unwrap(),
            Some("ORIGIN-AS".to_string())
        );
        assert_eq!(db.topology().asn_name(100).unwrap(), None);
    }

    #[test]
    fn test_unreadable_registry_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        // registry root exists but has no data directories at all
        let registry = Registry::new(dir.path().join("missing"));

        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let result = Ingestor::new(&db).run(
            vec![ann(100, "10.0.0.0/24", &[100, 300])],
            Some(&registry),
        );
        assert!(result.is_err());

        // nothing from the run is visible: the transaction rolled back
        assert_eq!(
            db.connection()
                .query_row("SELECT COUNT(*) FROM prefixes", [], |row| row
                    .get::<_, u32>(0))
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_host_bits_masked() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        Ingestor::new(&db)
            .run(vec![ann(100, "10.0.0.5/24", &[100, 300])], None)
            .unwrap();

        assert_eq!(
            db.topology().most_specific_prefix("10.0.0.7").unwrap(),
            net("10.0.0.0/24")
        );
    }

    #[test]
    fn test_last_ingest_stamp() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        Ingestor::new(&db)
            .run(vec![ann(100, "10.0.0.0/24", &[100, 300])], None)
            .unwrap();

        assert!(db.get_meta("last_ingest_at").unwrap().is_some());
    }
}
