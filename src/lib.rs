#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Periscope - BGP route-visibility analysis
//!
//! Periscope ingests route-collector dumps into a relational topology store,
//! answers "how does AS X reach prefix P" queries, validates announcements
//! against Route Origin Authorization records, and emits route graphs for an
//! external renderer. It can be used as both a command-line application and
//! a library.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`database`]**: the topology store (SQLite)
//!   - `connection`: connection management
//!   - `schema`: table definitions and lifecycle
//!   - `topology`: ASes, prefixes, AS-paths, origins, derived adjacency
//!   - `roa`: Route Origin Authorization entries and containment queries
//!
//! - **[`ingest`]**: the ingestion pipeline
//!   - `mrt`: boundary adapter over the external MRT decoder
//!   - `registry`: flat-file registry reader (ROA objects, AS names)
//!   - one-transaction batch runs via `Ingestor`
//!
//! - **[`lens`]**: query logic
//!   - `reachability`: path resolution (exact history + guessing strategies)
//!   - `graph`: abstract route-graph building and DOT serialization
//!
//! - **[`config`]**: configuration management
//!
//! Data flows strictly one way: decoder/registry → ingestion → store →
//! query lenses → graph description → external renderer.
//!
//! # Quick Start Examples
//!
//! ## Ingest a route dump
//!
//! ```rust,ignore
//! use periscope::database::PeriscopeDatabase;
//! use periscope::ingest::{Ingestor, MrtSource, Registry};
//!
//! let db = PeriscopeDatabase::open("routes.sqlite3")?;
//! let source = MrtSource::open("rib.20260401.mrt.gz")?;
//! let registry = Registry::new("/srv/registry");
//!
//! let stats = Ingestor::new(&db).run(source.announcements(), Some(&registry))?;
//! println!("{} announcements ingested", stats.announcements);
//! ```
//!
//! ## Resolve reachability and render a graph
//!
//! ```rust,ignore
//! use periscope::database::PeriscopeDatabase;
//! use periscope::lens::graph::RouteGraphBuilder;
//! use periscope::lens::reachability::{ReachabilityLens, ResolverAlgorithm};
//!
//! let db = PeriscopeDatabase::open_read_only("routes.sqlite3")?;
//! let lens = ReachabilityLens::new(&db);
//!
//! let result = lens.resolve("172.20.0.1", &[64512], ResolverAlgorithm::Collector)?;
//! let origins = db.roa().valid_origins(&result.prefix)?;
//!
//! let graph = RouteGraphBuilder::new().build(&[64512], &result, Some(&origins));
//! std::fs::write("routes.dot", graph.to_dot())?;
//! ```
//!
//! ## Check a ROA
//!
//! ```rust,ignore
//! use periscope::database::PeriscopeDatabase;
//!
//! let db = PeriscopeDatabase::open_read_only("routes.sqlite3")?;
//! let authorized = db.roa().is_authorized(&"172.20.0.0/24".parse()?, 64512)?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod lens;

// =============================================================================
// Configuration (always available)
// =============================================================================

pub use config::PeriscopeConfig;

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{
    AsnAdjacency, DatabaseConn, PeerInfo, PeriscopeDatabase, RoaEntry, RoaMatch, RoaRepository,
    SchemaDefinitions, SchemaManager, SchemaStatus, TopologyRepository, SCHEMA_VERSION,
};

// =============================================================================
// Ingestion Module
// =============================================================================

pub use ingest::{Announcement, IngestStats, Ingestor, MrtSource, Registry, RoaObject};

// =============================================================================
// Lens Module
// =============================================================================

pub use error::QueryError;
pub use lens::{
    ReachabilityLens, ReachabilityResult, ResolverAlgorithm, ResolverConfig, RouteGraph,
    RouteGraphBuilder,
};
