//! Database module
//!
//! All storage functionality for periscope:
//!
//! - **connection**: SQLite connection wrapper
//! - **schema**: schema definitions and lifecycle management
//! - **topology**: the relational topology model (ASes, prefixes, paths,
//!   origins, adjacency)
//! - **roa**: Route Origin Authorization entries and containment queries
//!
//! The store is populated wholesale by one ingestion run and read by the
//! query engines; repositories borrow a connection and never own it.

pub mod connection;
pub mod roa;
pub mod schema;
pub mod topology;

pub use connection::DatabaseConn;
pub use roa::{RoaEntry, RoaMatch, RoaRepository, DEFAULT_MAX_LENGTH_V4, DEFAULT_MAX_LENGTH_V6};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, SCHEMA_VERSION};
pub use topology::{AsnAdjacency, PeerInfo, TopologyRepository};

use anyhow::{anyhow, Result};
use tracing::info;

/// Main handle to the route-visibility store
///
/// `PeriscopeDatabase` opens the SQLite store, makes sure the schema is
/// usable, and hands out repository views. An incompatible or corrupted
/// schema is reset: the store only ever holds the output of one full
/// ingestion run, so there is nothing to migrate.
pub struct PeriscopeDatabase {
    db: DatabaseConn,
}

impl PeriscopeDatabase {
    /// Open (or create) the store at the specified path
    pub fn open(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_path(path)?;
        Self::ensure_schema(db)
    }

    /// Create an in-memory store (used by tests)
    pub fn open_in_memory() -> Result<Self> {
        let db = DatabaseConn::open_in_memory()?;
        Self::ensure_schema(db)
    }

    /// Open an existing store read-only for querying
    ///
    /// Fails if the store does not exist or carries an unusable schema;
    /// query-side callers cannot repair a store.
    pub fn open_read_only(path: &str) -> Result<Self> {
        let db = DatabaseConn::open_read_only(path)?;
        let schema = SchemaManager::new(&db.conn);
        match schema.check_status()? {
            SchemaStatus::Current => Ok(Self { db }),
            status => Err(anyhow!(
                "store at '{}' is not usable read-only: {:?}",
                path,
                status
            )),
        }
    }

    fn ensure_schema(db: DatabaseConn) -> Result<Self> {
        let schema = SchemaManager::new(&db.conn);

        match schema.check_status()? {
            SchemaStatus::Current => {}
            SchemaStatus::NotInitialized => {
                info!("Initializing topology store schema");
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                info!(
                    "Store schema incompatible (db: v{}, required: v{}), resetting",
                    database_version, required_version
                );
                schema.reset()?;
                schema.initialize()?;
            }
            SchemaStatus::Corrupted => {
                info!("Store schema corrupted, resetting");
                schema.reset()?;
                schema.initialize()?;
            }
        }

        Ok(Self { db })
    }

    /// Get a topology repository view
    pub fn topology(&self) -> TopologyRepository<'_> {
        TopologyRepository::new(&self.db.conn)
    }

    /// Get a ROA repository view
    pub fn roa(&self) -> RoaRepository<'_> {
        RoaRepository::new(&self.db.conn)
    }

    /// Get the underlying connection (for cross-repository transactions)
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.db.conn
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        SchemaManager::new(&self.db.conn).get_meta(key)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        SchemaManager::new(&self.db.conn).set_meta(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = PeriscopeDatabase::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_repositories_start_empty() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();

        assert!(db.topology().all_asns().unwrap().is_empty());
        assert_eq!(db.roa().count().unwrap(), 0);
    }

    #[test]
    fn test_meta_operations() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();

        db.set_meta("test_key", "test_value").unwrap();
        assert_eq!(
            db.get_meta("test_key").unwrap(),
            Some("test_value".to_string())
        );
    }

    #[test]
    fn test_open_read_only_requires_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        let path_str = path.to_str().unwrap().to_string();

        // populate a store, then reopen read-only
        {
            PeriscopeDatabase::open(&path_str).unwrap();
        }
        let ro = PeriscopeDatabase::open_read_only(&path_str).unwrap();
        assert!(ro.topology().all_asns().unwrap().is_empty());
    }
}
