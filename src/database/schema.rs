//! Topology store schema management
//!
//! All tables of the topology store are defined here to keep cross-table
//! queries consistent. Addresses are stored as family-native fixed-width
//! blobs (4 bytes for IPv4, 16 for IPv6) so that blob comparison doubles as
//! address comparison within a family, and the broadcast address of every
//! range is precomputed at insert time for containment queries.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 1;

/// Schema definitions for all tables in the topology store
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (schema version and run metadata)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS periscope_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// Autonomous systems; direct_feed marks collector peers
    pub const ASNS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS asns (
            asn INTEGER PRIMARY KEY,
            direct_feed INTEGER NOT NULL DEFAULT 0,
            name TEXT
        );
    "#;

    /// Announced prefixes with precomputed broadcast address
    pub const PREFIXES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefixes (
            network BLOB NOT NULL,
            length INTEGER NOT NULL,
            broadcast BLOB NOT NULL,
            PRIMARY KEY (network, length)
        );
    "#;

    /// Ordered hops of deduplicated AS-paths; path_id is a 64-bit content
    /// digest of the hop sequence
    pub const PATH_HOPS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS path_hops (
            path_id INTEGER NOT NULL,
            hop_index INTEGER NOT NULL,
            asn INTEGER NOT NULL,
            PRIMARY KEY (path_id, hop_index)
        );
    "#;

    /// Prefix to AS-path association (many-to-many)
    pub const PREFIX_PATHS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix_paths (
            network BLOB NOT NULL,
            length INTEGER NOT NULL,
            path_id INTEGER NOT NULL,
            PRIMARY KEY (network, length, path_id)
        );
    "#;

    /// Which AS(es) originate a prefix
    pub const PREFIX_ORIGINS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS prefix_origins (
            asn INTEGER NOT NULL,
            network BLOB NOT NULL,
            length INTEGER NOT NULL,
            PRIMARY KEY (asn, network, length)
        );
    "#;

    /// Directed adjacency: receiver learned a route from sender; transit is
    /// set once the sender is seen forwarding a prefix it does not originate
    pub const NEIGHBOURS_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS neighbours (
            receiver_asn INTEGER NOT NULL,
            sender_asn INTEGER NOT NULL,
            transit INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (receiver_asn, sender_asn)
        );
    "#;

    /// Route Origin Authorization entries
    pub const ROA_ENTRIES_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS roa_entries (
            network BLOB NOT NULL,
            length INTEGER NOT NULL,
            broadcast BLOB NOT NULL,
            max_length INTEGER NOT NULL,
            asn INTEGER NOT NULL,
            PRIMARY KEY (network, length, max_length, asn)
        );
    "#;

    /// SQL for creating indexes over the query-heavy columns
    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_path_hops_asn ON path_hops(asn)",
        "CREATE INDEX IF NOT EXISTS idx_prefix_paths_path ON prefix_paths(path_id)",
        "CREATE INDEX IF NOT EXISTS idx_prefix_origins_prefix ON prefix_origins(network, length)",
        "CREATE INDEX IF NOT EXISTS idx_neighbours_sender ON neighbours(sender_asn)",
        "CREATE INDEX IF NOT EXISTS idx_roa_entries_range ON roa_entries(network, broadcast)",
        "CREATE INDEX IF NOT EXISTS idx_roa_entries_asn ON roa_entries(asn)",
    ];

    const TABLES: &'static [&'static str] = &[
        Self::META_TABLE,
        Self::ASNS_TABLE,
        Self::PREFIXES_TABLE,
        Self::PATH_HOPS_TABLE,
        Self::PREFIX_PATHS_TABLE,
        Self::PREFIX_ORIGINS_TABLE,
        Self::NEIGHBOURS_TABLE,
        Self::ROA_ENTRIES_TABLE,
    ];
}

/// Schema manager for the topology store
///
/// Handles schema initialization, version checking, and reset.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Initialize the store schema
    ///
    /// Creates all tables and indexes if they don't exist and records the
    /// schema version in the meta table.
    pub fn initialize(&self) -> Result<()> {
        for table_sql in SchemaDefinitions::TABLES {
            self.conn
                .execute(table_sql, [])
                .map_err(|e| anyhow!("Failed to create table: {}", e))?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| anyhow!("Failed to create index: {}", e))?;
        }

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;

        Ok(())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let meta_exists: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='periscope_meta'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if meta_exists == 0 {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    /// Get the current schema version from the store
    fn get_schema_version(&self) -> Result<u32> {
        let version: String = self
            .conn
            .query_row(
                "SELECT value FROM periscope_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap_or_else(|_| "0".to_string());

        version
            .parse()
            .map_err(|e| anyhow!("Invalid schema version: {}", e))
    }

    /// Verify schema integrity by checking required tables exist
    fn verify_integrity(&self) -> Result<bool> {
        let required_tables = [
            "periscope_meta",
            "asns",
            "prefixes",
            "path_hops",
            "prefix_paths",
            "prefix_origins",
            "neighbours",
            "roa_entries",
        ];

        for table in required_tables {
            let exists: i32 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap_or(0);

            if exists == 0 {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO periscope_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| anyhow!("Failed to set meta value: {}", e))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM periscope_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(anyhow!("Failed to get meta value: {}", e)),
        }
    }

    /// Reset the store by dropping all tables
    pub fn reset(&self) -> Result<()> {
        for table in [
            "roa_entries",
            "neighbours",
            "prefix_origins",
            "prefix_paths",
            "path_hops",
            "prefixes",
            "asns",
            "periscope_meta",
        ] {
            self.conn
                .execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        }

        Ok(())
    }
}

/// Status of the store schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Store is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Store was written by a different schema version
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Schema is corrupted (missing tables)
    Corrupted,
}
