//! Topology repository for the route-visibility store
//!
//! Data access for the relational topology model: autonomous systems,
//! announced prefixes, deduplicated AS-paths, prefix origins, and derived
//! adjacency. Write operations are used by the ingestion pipeline only; the
//! query engines consume the read side.
//!
//! # Address storage
//!
//! Network and broadcast addresses are stored as family-native blobs (4 bytes
//! for IPv4, 16 for IPv6). SQLite compares blobs bytewise, so `network <= x
//! AND broadcast >= x` is a containment test as long as the query scopes rows
//! to one family via the blob width.
//!
//! # Path identity
//!
//! AS-paths are deduplicated by a 64-bit content digest over the ordered hop
//! sequence (leading 8 bytes of SHA-256). A digest that already maps to a
//! different hop sequence is a collision: the new path is skipped with a
//! warning rather than silently merged into the existing record.

use anyhow::{anyhow, Result};
use ipnet::IpNet;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::warn;

use crate::error::QueryError;

/// An ASN ranked by how many neighbours learned routes from or through it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(tabled::Tabled))]
pub struct AsnAdjacency {
    pub asn: u32,
    pub neighbour_count: u32,
}

/// A peer of an ASN with the transit evidence observed in either direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_asn: u32,
    pub name: Option<String>,
    /// The queried ASN was seen receiving a transited route from this peer
    pub receives_transit: bool,
    /// This peer was seen receiving a transited route from the queried ASN
    pub sends_transit: bool,
    /// Whether the peer itself feeds the route collector
    pub peer_direct_feed: bool,
}

/// Repository for topology data operations
pub struct TopologyRepository<'a> {
    conn: &'a Connection,
}

impl<'a> TopologyRepository<'a> {
    /// Create a new topology repository
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // =========================================================================
    // Write side (ingestion only)
    // =========================================================================

    /// Upsert an autonomous system
    ///
    /// `direct_feed` is monotonic: once an AS has been observed as a
    /// collector peer it stays marked. A name, once learned, is never erased
    /// by a later upsert without one.
    pub fn upsert_asn(&self, asn: u32, direct_feed: bool, name: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO asns (asn, direct_feed, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(asn) DO UPDATE SET
                     direct_feed = MAX(direct_feed, excluded.direct_feed),
                     name = COALESCE(excluded.name, name)",
                params![asn, direct_feed, name],
            )
            .map_err(|e| anyhow!("Failed to upsert AS{}: {}", asn, e))?;
        Ok(())
    }

    /// Insert a prefix; a prefix that already exists is left untouched
    pub fn insert_prefix(&self, net: &IpNet) -> Result<()> {
        let (network, broadcast, length) = net_to_blobs(net);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO prefixes (network, length, broadcast) VALUES (?1, ?2, ?3)",
                params![network, length, broadcast],
            )
            .map_err(|e| anyhow!("Failed to insert prefix {}: {}", net, e))?;
        Ok(())
    }

    /// Insert an AS-path, deduplicated by content digest
    ///
    /// Returns the path id, or `None` when the digest collides with a
    /// different stored hop sequence (the path is then not recorded).
    pub fn insert_path(&self, hops: &[u32]) -> Result<Option<i64>> {
        let path_id = path_digest(hops);

        let existing = self.stored_hops(path_id)?;
        if !existing.is_empty() {
            if existing == hops {
                return Ok(Some(path_id));
            }
            warn!(
                "path digest collision: id {} already maps to {:?}, skipping {:?}",
                path_id, existing, hops
            );
            return Ok(None);
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO path_hops (path_id, hop_index, asn) VALUES (?1, ?2, ?3)",
        )?;
        for (hop_index, asn) in hops.iter().enumerate() {
            stmt.execute(params![path_id, hop_index as i64, asn])?;
        }

        Ok(Some(path_id))
    }

    /// Associate a prefix with an observed AS-path
    pub fn link_prefix_path(&self, net: &IpNet, path_id: i64) -> Result<()> {
        let (network, _, length) = net_to_blobs(net);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO prefix_paths (network, length, path_id) VALUES (?1, ?2, ?3)",
                params![network, length, path_id],
            )
            .map_err(|e| anyhow!("Failed to link prefix {} to path: {}", net, e))?;
        Ok(())
    }

    /// Record that an AS originates a prefix
    pub fn record_origin(&self, asn: u32, net: &IpNet) -> Result<()> {
        let (network, _, length) = net_to_blobs(net);
        self.conn
            .execute(
                "INSERT OR IGNORE INTO prefix_origins (asn, network, length) VALUES (?1, ?2, ?3)",
                params![asn, network, length],
            )
            .map_err(|e| anyhow!("Failed to record origin AS{} for {}: {}", asn, net, e))?;
        Ok(())
    }

    /// Upsert a directed adjacency; the transit flag flips false to true only
    pub fn upsert_neighbour(&self, receiver_asn: u32, sender_asn: u32, transit: bool) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO neighbours (receiver_asn, sender_asn, transit) VALUES (?1, ?2, ?3)
                 ON CONFLICT(receiver_asn, sender_asn) DO UPDATE SET
                     transit = MAX(transit, excluded.transit)",
                params![receiver_asn, sender_asn, transit],
            )
            .map_err(|e| anyhow!("Failed to upsert neighbour pair: {}", e))?;
        Ok(())
    }

    /// Set the display name of an AS without touching its other attributes
    pub fn set_asn_name(&self, asn: u32, name: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE asns SET name = ?2 WHERE asn = ?1",
                params![asn, name],
            )
            .map_err(|e| anyhow!("Failed to set name for AS{}: {}", asn, e))?;
        Ok(())
    }

    // =========================================================================
    // Read side (query engines)
    // =========================================================================

    /// Resolve a prefix or bare address to the stored prefix that answers it
    ///
    /// A bare address (or a host-length CIDR) resolves to the most specific
    /// stored prefix containing it, scoped to its address family. An explicit
    /// shorter CIDR must exist verbatim in the store.
    pub fn most_specific_prefix(&self, target: &str) -> Result<IpNet, QueryError> {
        let net = parse_target(target)?;

        if net.prefix_len() == net.max_prefix_len() {
            let addr = addr_to_blob(&net.addr());
            let row = self
                .conn
                .query_row(
                    "SELECT network, length FROM prefixes
                     WHERE network <= ?1 AND broadcast >= ?1 AND length(network) = ?2
                     ORDER BY length DESC LIMIT 1",
                    params![addr, addr.len() as i64],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u8>(1)?)),
                )
                .optional()?;

            match row {
                Some((network, length)) => blob_to_net(&network, length)
                    .map_err(|e| QueryError::InvalidArgument(e.to_string())),
                None => Err(QueryError::PrefixNotFound(target.to_string())),
            }
        } else {
            let (network, _, length) = net_to_blobs(&net);
            let exists: Option<i64> = self
                .conn
                .query_row(
                    "SELECT 1 FROM prefixes WHERE network = ?1 AND length = ?2",
                    params![network, length],
                    |row| row.get(0),
                )
                .optional()?;

            if exists.is_some() {
                Ok(net)
            } else {
                Err(QueryError::PrefixNotFound(net.to_string()))
            }
        }
    }

    /// Ids of all AS-paths observed for a prefix that contain the given hop
    pub fn paths_for_prefix_and_asn(
        &self,
        net: &IpNet,
        asn: u32,
    ) -> Result<Vec<i64>, QueryError> {
        let (network, _, length) = net_to_blobs(net);
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT path_hops.path_id FROM path_hops
             INNER JOIN prefix_paths ON path_hops.path_id = prefix_paths.path_id
             WHERE path_hops.asn = ?1 AND prefix_paths.network = ?2 AND prefix_paths.length = ?3",
        )?;
        let ids = stmt
            .query_map(params![asn, network, length], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// The ordered hop sequence of a stored AS-path
    pub fn path_hops(&self, path_id: i64) -> Result<Vec<u32>, QueryError> {
        Ok(self.stored_hops(path_id)?)
    }

    fn stored_hops(&self, path_id: i64) -> Result<Vec<u32>, rusqlite::Error> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT asn FROM path_hops WHERE path_id = ?1 ORDER BY hop_index",
        )?;
        let hops = stmt.query_map([path_id], |row| row.get(0))?.collect();
        hops
    }

    /// All ASes observed originating the given prefix
    pub fn origin_asns(&self, net: &IpNet) -> Result<Vec<u32>, QueryError> {
        let (network, _, length) = net_to_blobs(net);
        let mut stmt = self.conn.prepare_cached(
            "SELECT asn FROM prefix_origins WHERE network = ?1 AND length = ?2",
        )?;
        let asns = stmt
            .query_map(params![network, length], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(asns)
    }

    /// The full adjacency relation as an undirected neighbour map
    ///
    /// Direction and the transit flag are deliberately discarded: the
    /// fallback path search treats any observed adjacency as a potential
    /// link in either direction.
    pub fn undirected_adjacency(&self) -> Result<HashMap<u32, Vec<u32>>, QueryError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT receiver_asn, sender_asn FROM neighbours")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)))?
            .collect::<Result<Vec<(u32, u32)>, _>>()?;

        let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
        for (receiver, sender) in pairs {
            adjacency.entry(receiver).or_default().push(sender);
            adjacency.entry(sender).or_default().push(receiver);
        }
        Ok(adjacency)
    }

    /// ASNs ranked by adjacency count, most connected first
    pub fn suggested_asns(&self, limit: u32) -> Result<Vec<AsnAdjacency>, QueryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT receiver_asn, COUNT(sender_asn) FROM neighbours
             GROUP BY receiver_asn ORDER BY COUNT(sender_asn) DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit], |row| {
                Ok(AsnAdjacency {
                    asn: row.get(0)?,
                    neighbour_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All prefixes originated by an AS
    pub fn originated_prefixes(&self, asn: u32) -> Result<Vec<IpNet>, QueryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT network, length FROM prefix_origins WHERE asn = ?1 ORDER BY length, network",
        )?;
        let rows = stmt
            .query_map([asn], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, u8>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut nets = Vec::with_capacity(rows.len());
        for (network, length) in rows {
            nets.push(
                blob_to_net(&network, length)
                    .map_err(|e| QueryError::InvalidArgument(e.to_string()))?,
            );
        }
        Ok(nets)
    }

    /// Peers of an AS in either direction, with transit evidence per direction
    pub fn peers_of(&self, asn: u32) -> Result<Vec<PeerInfo>, QueryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT peer_asn, asns.name, MAX(receives_transit), MAX(sends_transit), asns.direct_feed
             FROM (SELECT receiver_asn AS local_asn, sender_asn AS peer_asn,
                          transit AS receives_transit, 0 AS sends_transit
                   FROM neighbours
                   UNION
                   SELECT sender_asn AS local_asn, receiver_asn AS peer_asn,
                          0 AS receives_transit, transit AS sends_transit
                   FROM neighbours)
             INNER JOIN asns ON asns.asn = peer_asn
             WHERE local_asn = ?1 AND peer_asn <> local_asn
             GROUP BY peer_asn",
        )?;
        let rows = stmt
            .query_map([asn], |row| {
                Ok(PeerInfo {
                    peer_asn: row.get(0)?,
                    name: row.get(1)?,
                    receives_transit: row.get(2)?,
                    sends_transit: row.get(3)?,
                    peer_direct_feed: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Path fragments where an AS from `leading` precedes an AS from
    /// `trailing` on the same stored path
    ///
    /// Each fragment runs from the leading hop to the trailing hop in path
    /// order. Used to find how one group of networks reaches another purely
    /// from co-occurrence in observed paths.
    pub fn ordered_fragments(
        &self,
        leading: &[u32],
        trailing: &[u32],
    ) -> Result<Vec<Vec<u32>>, QueryError> {
        if leading.is_empty() || trailing.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT a.path_id, a.hop_index, b.hop_index FROM path_hops a, path_hops b
             WHERE a.path_id = b.path_id AND a.asn IN ({}) AND b.asn IN ({})
               AND b.hop_index > a.hop_index",
            placeholders(leading.len()),
            placeholders(trailing.len()),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let spans = stmt
            .query_map(
                rusqlite::params_from_iter(leading.iter().chain(trailing.iter())),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut fragments = Vec::with_capacity(spans.len());
        for (path_id, start, end) in spans {
            fragments.push(self.fragment_hops(path_id, start, end)?);
        }
        Ok(fragments)
    }

    /// Path fragments linking an AS to any AS of `group`, in either order
    ///
    /// Fragments are oriented to start at `asn`.
    pub fn linking_fragments(&self, group: &[u32], asn: u32) -> Result<Vec<Vec<u32>>, QueryError> {
        if group.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT a.path_id, a.hop_index, b.hop_index FROM path_hops a, path_hops b
             WHERE a.path_id = b.path_id AND a.asn IN ({}) AND b.asn = ?",
            placeholders(group.len()),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let spans = stmt
            .query_map(
                rusqlite::params_from_iter(
                    group
                        .iter()
                        .copied()
                        .chain(std::iter::once(asn)),
                ),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut fragments = Vec::with_capacity(spans.len());
        for (path_id, group_index, asn_index) in spans {
            let mut hops =
                self.fragment_hops(path_id, group_index.min(asn_index), group_index.max(asn_index))?;
            if hops.first() != Some(&asn) {
                hops.reverse();
            }
            fragments.push(hops);
        }
        Ok(fragments)
    }

    fn fragment_hops(&self, path_id: i64, start: i64, end: i64) -> Result<Vec<u32>, QueryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT asn FROM path_hops
             WHERE path_id = ?1 AND hop_index >= ?2 AND hop_index <= ?3
             ORDER BY hop_index",
        )?;
        let hops = stmt
            .query_map(params![path_id, start, end], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(hops)
    }

    /// The display name of an AS, if one was learned
    pub fn asn_name(&self, asn: u32) -> Result<Option<String>, QueryError> {
        let name: Option<Option<String>> = self
            .conn
            .query_row("SELECT name FROM asns WHERE asn = ?1", [asn], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name.flatten())
    }

    /// All ASNs currently in the store
    pub fn all_asns(&self) -> Result<Vec<u32>, QueryError> {
        let mut stmt = self.conn.prepare_cached("SELECT asn FROM asns ORDER BY asn")?;
        let asns = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(asns)
    }

    /// Whether an AS was a direct collector feed
    pub fn is_direct_feed(&self, asn: u32) -> Result<bool, QueryError> {
        let feed: Option<bool> = self
            .conn
            .query_row(
                "SELECT direct_feed FROM asns WHERE asn = ?1",
                [asn],
                |row| row.get(0),
            )
            .optional()?;
        Ok(feed.unwrap_or(false))
    }
}

// =============================================================================
// Address and digest helpers
// =============================================================================

/// Split a network into (network blob, broadcast blob, prefix length)
pub(crate) fn net_to_blobs(net: &IpNet) -> (Vec<u8>, Vec<u8>, u8) {
    (
        addr_to_blob(&net.network()),
        addr_to_blob(&net.broadcast()),
        net.prefix_len(),
    )
}

/// Family-native fixed-width byte representation of an address
pub(crate) fn addr_to_blob(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Rebuild a network from its stored blob and prefix length
pub(crate) fn blob_to_net(network: &[u8], length: u8) -> Result<IpNet> {
    let addr: IpAddr = match network.len() {
        4 => {
            let octets: [u8; 4] = network
                .try_into()
                .map_err(|_| anyhow!("bad IPv4 blob length"))?;
            IpAddr::from(octets)
        }
        16 => {
            let octets: [u8; 16] = network
                .try_into()
                .map_err(|_| anyhow!("bad IPv6 blob length"))?;
            IpAddr::from(octets)
        }
        n => return Err(anyhow!("unexpected address blob width {}", n)),
    };
    IpNet::new(addr, length).map_err(|e| anyhow!("invalid prefix length {}: {}", length, e))
}

/// 64-bit content digest of an ordered hop sequence
///
/// Leading 8 bytes of SHA-256 over the big-endian hop encodings. Stable
/// across runs and platforms; collisions are detected at insert time.
pub(crate) fn path_digest(hops: &[u32]) -> i64 {
    let mut hasher = Sha256::new();
    for hop in hops {
        hasher.update(hop.to_be_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// SQL placeholder list of the given arity
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Parse a query target: a CIDR (host bits tolerated) or a bare address
fn parse_target(target: &str) -> Result<IpNet, QueryError> {
    if target.contains('/') {
        let net: IpNet = target
            .parse()
            .map_err(|e| QueryError::InvalidArgument(format!("bad prefix '{}': {}", target, e)))?;
        Ok(net.trunc())
    } else {
        let addr: IpAddr = target
            .parse()
            .map_err(|e| QueryError::InvalidArgument(format!("bad address '{}': {}", target, e)))?;
        IpNet::new(addr, if addr.is_ipv4() { 32 } else { 128 })
            .map_err(|e| QueryError::InvalidArgument(e.to_string()))
    }
}
