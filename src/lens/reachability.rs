//! Reachability lens: AS-to-prefix path resolution
//!
//! Answers "how does AS X reach prefix P" against the topology store. Exact
//! observed paths win; when a source AS has no observed path to the prefix,
//! a strategy-specific search produces guessed paths instead:
//!
//! - [`CollectorResolver`] searches the undirected adjacency graph for
//!   shortest routes to any origin of the prefix, with a bounded worklist.
//! - [`TierOneResolver`] reasons from a fixed allow-list of transit-free
//!   networks, concatenating observed path fragments source→tier-1 and
//!   tier-1→origin. This mode is best-effort: a tier-1 source with no
//!   fragments of its own yields an empty result, and ties are kept only at
//!   the globally minimal combined length.
//!
//! All operations are read-only; an unreachable source yields an empty
//! result, not an error.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

use crate::database::{PeriscopeDatabase, TopologyRepository};
use crate::error::QueryError;

/// Default budget of distinct ASNs the guessed-path search may explore
pub const DEFAULT_MAX_EXPLORED_ASNS: usize = 50;

/// Transit-free networks used as reachability anchors by the tier-1 strategy
pub const DEFAULT_TIER1_ASNS: &[u32] = &[
    174,   // Cogent
    701,   // Verizon
    1299,  // Arelion
    2914,  // NTT
    3257,  // GTT
    3320,  // DTAG
    3356,  // Lumen
    3491,  // PCCW
    5511,  // Orange
    6453,  // TATA
    6461,  // Zayo
    6762,  // Sparkle
    6830,  // Liberty Global
    6939,  // HE
    7018,  // AT&T
    7922,  // Comcast
    12956, // Telefonica
];

/// Resolution algorithm selected per query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ResolverAlgorithm {
    /// Adjacency search: assume observed neighbours relay routes onward
    #[default]
    Collector,
    /// Tier-1 anchoring: join observed fragments through transit-free
    /// networks (for address space with sparse collector visibility)
    TierOne,
}

/// Tuning knobs for the resolution strategies
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Budget of distinct ASNs the adjacency search may explore
    pub max_explored_asns: usize,
    /// Allow-list of tier-1 networks for the anchoring strategy
    pub tier1_asns: BTreeSet<u32>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_explored_asns: DEFAULT_MAX_EXPLORED_ASNS,
            tier1_asns: DEFAULT_TIER1_ASNS.iter().copied().collect(),
        }
    }
}

/// Paths found for one source ASN
#[derive(Debug, Clone, Default)]
pub struct SourcePaths {
    /// Observed paths, truncated to start at the source
    pub confirmed: BTreeSet<Vec<u32>>,
    /// Inferred paths from the strategy's search
    pub guessed: BTreeSet<Vec<u32>>,
}

/// Merged reachability answer across all requested sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityResult {
    /// The resolved destination prefix
    pub prefix: IpNet,
    /// Confirmed paths from any source, equal-shortest per source
    pub paths: BTreeSet<Vec<u32>>,
    /// Guessed paths for sources with no observed data
    pub guessed_paths: BTreeSet<Vec<u32>>,
}

impl ReachabilityResult {
    /// True when no path of either kind was found
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.guessed_paths.is_empty()
    }
}

/// A path-resolution strategy
pub trait PathResolver {
    /// Optimal paths from one source ASN to the resolved prefix
    fn paths_to_prefix(
        &self,
        topology: &TopologyRepository<'_>,
        prefix: &IpNet,
        source_asn: u32,
    ) -> Result<SourcePaths, QueryError>;
}

// =============================================================================
// Exact phase (shared by both strategies)
// =============================================================================

/// Observed equal-shortest paths from the source to the prefix
fn exact_paths(
    topology: &TopologyRepository<'_>,
    prefix: &IpNet,
    source_asn: u32,
) -> Result<BTreeSet<Vec<u32>>, QueryError> {
    let mut best: BTreeSet<Vec<u32>> = BTreeSet::new();
    let mut min_len = usize::MAX;

    for path_id in topology.paths_for_prefix_and_asn(prefix, source_asn)? {
        let hops = topology.path_hops(path_id)?;
        let truncated = truncate_at(&hops, source_asn);
        match truncated.len().cmp(&min_len) {
            std::cmp::Ordering::Less => {
                min_len = truncated.len();
                best.clear();
                best.insert(truncated);
            }
            std::cmp::Ordering::Equal => {
                best.insert(truncated);
            }
            std::cmp::Ordering::Greater => {}
        }
    }

    Ok(best)
}

/// Drop the hops before the first occurrence of `asn`
fn truncate_at(hops: &[u32], asn: u32) -> Vec<u32> {
    match hops.iter().position(|&hop| hop == asn) {
        Some(index) => hops[index..].to_vec(),
        None => hops.to_vec(),
    }
}

// =============================================================================
// Collector strategy
// =============================================================================

/// Resolves via exact history, falling back to a bounded shortest-path
/// search over the undirected adjacency graph
pub struct CollectorResolver {
    max_explored_asns: usize,
}

impl CollectorResolver {
    /// Create a collector resolver from the given configuration
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            max_explored_asns: config.max_explored_asns,
        }
    }
}

impl PathResolver for CollectorResolver {
    fn paths_to_prefix(
        &self,
        topology: &TopologyRepository<'_>,
        prefix: &IpNet,
        source_asn: u32,
    ) -> Result<SourcePaths, QueryError> {
        let confirmed = exact_paths(topology, prefix, source_asn)?;
        if !confirmed.is_empty() {
            return Ok(SourcePaths {
                confirmed,
                guessed: BTreeSet::new(),
            });
        }

        debug!(
            "no observed paths from AS{} to {}, searching adjacency",
            source_asn, prefix
        );
        let origins: BTreeSet<u32> = topology.origin_asns(prefix)?.into_iter().collect();
        let guessed =
            shortest_adjacency_paths(topology, source_asn, &origins, self.max_explored_asns)?;

        Ok(SourcePaths {
            confirmed: BTreeSet::new(),
            guessed,
        })
    }
}

/// All shortest paths from `source` to any ASN in `origins` over the
/// undirected adjacency view
///
/// Explicit worklist with a budget of distinct explored ASNs: the adjacency
/// graph can contain cycles and wide fan-out, so the search halts at the
/// budget and returns whatever complete paths it has (possibly none).
fn shortest_adjacency_paths(
    topology: &TopologyRepository<'_>,
    source: u32,
    origins: &BTreeSet<u32>,
    budget: usize,
) -> Result<BTreeSet<Vec<u32>>, QueryError> {
    if origins.is_empty() {
        return Ok(BTreeSet::new());
    }
    if origins.contains(&source) {
        return Ok(BTreeSet::from([vec![source]]));
    }

    let adjacency = topology.undirected_adjacency()?;

    let mut dist: HashMap<u32, usize> = HashMap::from([(source, 0)]);
    // every equal-distance predecessor, for enumerating all tied paths
    let mut parents: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut queue: VecDeque<u32> = VecDeque::from([source]);
    let mut explored = 0usize;
    let mut best_origin_dist: Option<usize> = None;

    while let Some(node) = queue.pop_front() {
        let node_dist = dist[&node];
        if let Some(best) = best_origin_dist {
            if node_dist >= best {
                continue;
            }
        }

        explored += 1;
        if explored > budget {
            debug!(
                "exhausted search space ({} > {} ASNs), stopping",
                explored, budget
            );
            break;
        }

        for &next in adjacency.get(&node).into_iter().flatten() {
            match dist.get(&next) {
                None => {
                    dist.insert(next, node_dist + 1);
                    parents.entry(next).or_default().push(node);
                    queue.push_back(next);
                    if origins.contains(&next) {
                        best_origin_dist = Some(match best_origin_dist {
                            Some(best) => best.min(node_dist + 1),
                            None => node_dist + 1,
                        });
                    }
                }
                Some(&next_dist) if next_dist == node_dist + 1 => {
                    parents.entry(next).or_default().push(node);
                }
                Some(_) => {}
            }
        }
    }

    let min_dist = origins.iter().filter_map(|o| dist.get(o).copied()).min();
    let Some(min_dist) = min_dist else {
        return Ok(BTreeSet::new());
    };

    let mut paths = BTreeSet::new();
    for &origin in origins {
        if dist.get(&origin) == Some(&min_dist) {
            collect_paths(origin, source, &parents, &mut vec![origin], &mut paths);
        }
    }
    Ok(paths)
}

/// Walk the predecessor relation back from `node` to `source`, emitting
/// every tied path in source-first order
fn collect_paths(
    node: u32,
    source: u32,
    parents: &HashMap<u32, Vec<u32>>,
    suffix: &mut Vec<u32>,
    out: &mut BTreeSet<Vec<u32>>,
) {
    if node == source {
        out.insert(suffix.iter().rev().copied().collect());
        return;
    }
    let Some(preds) = parents.get(&node) else {
        return;
    };
    for &pred in preds {
        suffix.push(pred);
        collect_paths(pred, source, parents, suffix, out);
        suffix.pop();
    }
}

// =============================================================================
// Tier-1 strategy
// =============================================================================

/// Resolves via exact history, falling back to concatenated path fragments
/// through tier-1 networks
pub struct TierOneResolver {
    tier1_asns: BTreeSet<u32>,
}

impl TierOneResolver {
    /// Create a tier-1 resolver from the given configuration
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            tier1_asns: config.tier1_asns.clone(),
        }
    }
}

impl PathResolver for TierOneResolver {
    fn paths_to_prefix(
        &self,
        topology: &TopologyRepository<'_>,
        prefix: &IpNet,
        source_asn: u32,
    ) -> Result<SourcePaths, QueryError> {
        let confirmed = exact_paths(topology, prefix, source_asn)?;
        if !confirmed.is_empty() {
            return Ok(SourcePaths {
                confirmed,
                guessed: BTreeSet::new(),
            });
        }

        let origins = topology.origin_asns(prefix)?;
        let tier1: Vec<u32> = self.tier1_asns.iter().copied().collect();

        // fragments where a tier-1 network later reaches an origin: the
        // tier-1 likely considers that origin a downstream
        let tier1_to_origin = topology.ordered_fragments(&tier1, &origins)?;
        if tier1_to_origin.is_empty() {
            debug!("no tier-1 fragments towards origins of {}", prefix);
            return Ok(SourcePaths::default());
        }

        let mut shortest_by_tier1: HashMap<u32, BTreeSet<Vec<u32>>> = HashMap::new();
        for fragment in &tier1_to_origin {
            shortest_by_tier1
                .entry(fragment[0])
                .or_default()
                .insert(fragment.clone());
        }
        for fragments in shortest_by_tier1.values_mut() {
            *fragments = shortest_of(fragments);
        }

        let mut guessed = BTreeSet::new();

        if self.tier1_asns.contains(&source_asn) {
            // a tier-1 source reaches the origin through its own fragments;
            // without any, the answer stays empty
            if let Some(fragments) = shortest_by_tier1.get(&source_asn) {
                guessed = fragments.clone();
            }
        } else {
            let source_fragments = topology.linking_fragments(&tier1, source_asn)?;
            if source_fragments.is_empty() {
                debug!("no fragments linking AS{} to a tier-1 network", source_asn);
                return Ok(SourcePaths::default());
            }
            let shortest_source = shortest_of(&source_fragments.iter().cloned().collect());

            // combined target length counts the shared tier-1 hop once
            let tier1_min = tier1_to_origin
                .iter()
                .map(Vec::len)
                .min()
                .unwrap_or(usize::MAX);
            let source_min = shortest_source
                .iter()
                .map(Vec::len)
                .min()
                .unwrap_or(usize::MAX);
            let target_len = source_min + tier1_min - 1;

            for source_fragment in &shortest_source {
                let Some(&anchor) = source_fragment.last() else {
                    continue;
                };
                let Some(onward) = shortest_by_tier1.get(&anchor) else {
                    continue;
                };
                for tier1_fragment in onward {
                    let mut joined = source_fragment.clone();
                    joined.extend(&tier1_fragment[1..]);
                    if joined.len() == target_len {
                        guessed.insert(joined);
                    }
                }
            }
        }

        Ok(SourcePaths {
            confirmed: BTreeSet::new(),
            guessed,
        })
    }
}

/// Keep only the shortest members of a fragment set
fn shortest_of(fragments: &BTreeSet<Vec<u32>>) -> BTreeSet<Vec<u32>> {
    let Some(min_len) = fragments.iter().map(Vec::len).min() else {
        return BTreeSet::new();
    };
    fragments
        .iter()
        .filter(|f| f.len() == min_len)
        .cloned()
        .collect()
}

// =============================================================================
// Lens
// =============================================================================

/// Reachability lens over a topology store
///
/// # Example
///
/// ```rust,ignore
/// use periscope::database::PeriscopeDatabase;
/// use periscope::lens::reachability::{ReachabilityLens, ResolverAlgorithm};
///
/// let db = PeriscopeDatabase::open_read_only("routes.sqlite3")?;
/// let lens = ReachabilityLens::new(&db);
///
/// let result = lens.resolve("172.20.0.1", &[64512], ResolverAlgorithm::Collector)?;
/// for path in &result.paths {
///     println!("{:?}", path);
/// }
/// ```
pub struct ReachabilityLens<'a> {
    db: &'a PeriscopeDatabase,
    config: ResolverConfig,
}

impl<'a> ReachabilityLens<'a> {
    /// Create a lens with default resolver configuration
    pub fn new(db: &'a PeriscopeDatabase) -> Self {
        Self::with_config(db, ResolverConfig::default())
    }

    /// Create a lens with explicit resolver configuration
    pub fn with_config(db: &'a PeriscopeDatabase, config: ResolverConfig) -> Self {
        Self { db, config }
    }

    /// Resolve reachability from a set of source ASNs to a prefix or address
    ///
    /// The target is resolved once (most specific stored prefix for an
    /// address, verbatim match for an explicit CIDR); every source is then
    /// resolved independently against that same prefix and the per-source
    /// answers are merged.
    pub fn resolve(
        &self,
        target: &str,
        source_asns: &[u32],
        algorithm: ResolverAlgorithm,
    ) -> Result<ReachabilityResult, QueryError> {
        if source_asns.is_empty() {
            return Err(QueryError::InvalidArgument(
                "no source ASNs specified".to_string(),
            ));
        }

        let topology = self.db.topology();
        let prefix = topology.most_specific_prefix(target)?;
        debug!("resolved target {} -> {}", target, prefix);

        let resolver: Box<dyn PathResolver> = match algorithm {
            ResolverAlgorithm::Collector => Box::new(CollectorResolver::new(&self.config)),
            ResolverAlgorithm::TierOne => Box::new(TierOneResolver::new(&self.config)),
        };

        let mut result = ReachabilityResult {
            prefix,
            paths: BTreeSet::new(),
            guessed_paths: BTreeSet::new(),
        };

        let sources: BTreeSet<u32> = source_asns.iter().copied().collect();
        for source_asn in sources {
            let source_paths = resolver.paths_to_prefix(&topology, &prefix, source_asn)?;
            result.paths.extend(source_paths.confirmed);
            result.guessed_paths.extend(source_paths.guessed);
        }

        Ok(result)
    }

    /// Parse raw source-ASN parameters as handed over by a caller
    pub fn parse_source_asns(raw: &[String]) -> Result<Vec<u32>, QueryError> {
        raw.iter()
            .map(|s| {
                s.trim().parse::<u32>().map_err(|_| {
                    QueryError::InvalidArgument(format!("invalid ASN in request: '{}'", s))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Announcement, Ingestor};

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

    fn populated_db(announcements: Vec<Announcement>) -> PeriscopeDatabase {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        Ingestor::new(&db).run(announcements, None).unwrap();
        db
    }

    fn paths(set: &BTreeSet<Vec<u32>>) -> Vec<Vec<u32>> {
        set.iter().cloned().collect()
    }

    #[test]
    fn test_exact_equal_shortest_paths_all_kept() {
        let db = populated_db(vec![
            ann(100, "10.0.0.0/24", &[100, 200, 300]),
            ann(100, "10.0.0.0/24", &[100, 250, 300]),
        ]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.0.0.0/24", &[100], ResolverAlgorithm::Collector)
            .unwrap();

        assert_eq!(result.prefix, net("10.0.0.0/24"));
        assert_eq!(
            paths(&result.paths),
            vec![vec![100, 200, 300], vec![100, 250, 300]]
        );
        assert!(result.guessed_paths.is_empty());
    }

    #[test]
    fn test_exact_truncates_at_source_hop() {
        let db = populated_db(vec![ann(50, "10.0.0.0/24", &[50, 100, 200, 300])]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.0.0.0/24", &[100], ResolverAlgorithm::Collector)
            .unwrap();

        assert_eq!(paths(&result.paths), vec![vec![100, 200, 300]]);
    }

    #[test]
    fn test_exact_keeps_only_minimum_length() {
        let db = populated_db(vec![
            ann(100, "10.0.0.0/24", &[100, 200, 300]),
            ann(100, "10.0.0.0/24", &[100, 210, 220, 300]),
        ]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.0.0.0/24", &[100], ResolverAlgorithm::Collector)
            .unwrap();

        assert_eq!(paths(&result.paths), vec![vec![100, 200, 300]]);
    }

    #[test]
    fn test_address_resolves_most_specific_prefix() {
        let db = populated_db(vec![
            ann(100, "10.0.0.0/8", &[100, 300]),
            ann(100, "10.1.0.0/16", &[100, 200, 301]),
        ]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.1.2.3", &[100], ResolverAlgorithm::Collector)
            .unwrap();
        assert_eq!(result.prefix, net("10.1.0.0/16"));
    }

    #[test]
    fn test_fallback_only_when_exact_empty() {
        // source 100 has an observed path; source 400 has adjacency only
        let db = populated_db(vec![
            ann(100, "10.0.0.0/24", &[100, 200, 300]),
            ann(400, "10.9.0.0/24", &[400, 200]),
        ]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.0.0.0/24", &[100, 400], ResolverAlgorithm::Collector)
            .unwrap();

        assert_eq!(paths(&result.paths), vec![vec![100, 200, 300]]);
        // 400 reaches origin 300 through 200 by adjacency inference
        assert_eq!(paths(&result.guessed_paths), vec![vec![400, 200, 300]]);
    }

    #[test]
    fn test_fallback_finds_all_tied_routes() {
        // two disjoint length-2 routes from 500 to origin 300
        let db = populated_db(vec![
            ann(100, "10.0.0.0/24", &[100, 300]),
            ann(500, "10.9.0.0/24", &[500, 200]),
            ann(500, "10.9.0.0/24", &[500, 250]),
            ann(200, "10.8.0.0/24", &[200, 300]),
            ann(250, "10.7.0.0/24", &[250, 300]),
        ]);
        let lens = ReachabilityLens::new(&db);

        let result = lens
            .resolve("10.0.0.0/24", &[500], ResolverAlgorithm::Collector)
            .unwrap();

        assert!(result.paths.is_empty());
        assert_eq!(
            paths(&result.guessed_paths),
            vec![vec![500, 200, 300], vec![500, 250, 300]]
        );
    }

    #[test]
    fn test_no_adjacency_yields_empty_result_not_error() {
        let db = populated_db(vec![ann(100, "10.0.0.0/24", &[100, 300])]);
        let lens = ReachabilityLens::new(&db);

        // AS 999 was never seen anywhere
        let result = lens
            .resolve("10.0.0.0/24", &[999], ResolverAlgorithm::Collector)
            .unwrap();

        assert!(result.is_empty());
    }

    #[test]
    fn test_prefix_not_found_is_an_error() {
        let db = populated_db(vec![ann(100, "10.0.0.0/24", &[100, 300])]);
        let lens = ReachabilityLens::new(&db);

        let err = lens
            .resolve("10.99.0.0/24", &[100], ResolverAlgorithm::Collector)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_no_sources_is_invalid_argument() {
        let db = populated_db(vec![ann(100, "10.0.0.0/24", &[100, 300])]);
        let lens = ReachabilityLens::new(&db);

        let err = lens
            .resolve("10.0.0.0/24", &[], ResolverAlgorithm::Collector)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[test]
    fn test_parse_source_asns() {
        assert_eq!(
            ReachabilityLens::parse_source_asns(&["100".to_string(), " 200 ".to_string()])
                .unwrap(),
            vec![100, 200]
        );
        assert!(matches!(
            ReachabilityLens::parse_source_asns(&["abc".to_string()]),
            Err(QueryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_search_budget_bounds_long_chain() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let topology = db.topology();

        // chain 1000 - 1001 - ... - 1060, origin at the far end
        let prefix = net("10.0.0.0/24");
        topology.insert_prefix(&prefix).unwrap();
        topology.record_origin(1060, &prefix).unwrap();
        for asn in 1000..1060u32 {
            topology.upsert_neighbour(asn, asn + 1, true).unwrap();
        }

        let config = ResolverConfig {
            max_explored_asns: 10,
            ..ResolverConfig::default()
        };
        let lens = ReachabilityLens::with_config(&db, config);

        // must terminate within the budget and come back empty-handed
        let result = lens
            .resolve("10.0.0.0/24", &[1000], ResolverAlgorithm::Collector)
            .unwrap();
        assert!(result.is_empty());

        // a budget larger than the chain finds the full route
        let config = ResolverConfig {
            max_explored_asns: 100,
            ..ResolverConfig::default()
        };
        let lens = ReachabilityLens::with_config(&db, config);
        let result = lens
            .resolve("10.0.0.0/24", &[1000], ResolverAlgorithm::Collector)
            .unwrap();
        assert_eq!(result.guessed_paths.len(), 1);
        let path = result.guessed_paths.iter().next().unwrap();
        assert_eq!(path.len(), 61);
        assert_eq!(path[0], 1000);
        assert_eq!(path[60], 1060);
    }

    #[test]
    fn test_source_originating_prefix() {
        let db = PeriscopeDatabase::open_in_memory().unwrap();
        let topology = db.topology();
        let prefix = net("10.0.0.0/24");
        topology.insert_prefix(&prefix).unwrap();
        topology.record_origin(300, &prefix).unwrap();

        let lens = ReachabilityLens::new(&db);
        let result = lens
            .resolve("10.0.0.0/24", &[300], ResolverAlgorithm::Collector)
            .unwrap();
        assert_eq!(paths(&result.guessed_paths), vec![vec![300]]);
    }

    fn tier1_config() -> ResolverConfig {
        ResolverConfig {
            tier1_asns: BTreeSet::from([65100, 65101]),
            ..ResolverConfig::default()
        }
    }

    #[test]
    fn test_tier_one_concatenates_fragments() {
        let db = populated_db(vec![
            // tier-1 65100 reaches origin 65000 for the target prefix
            ann(900, "10.0.0.0/24", &[900, 65100, 65000]),
            // source 800 reaches the tier-1 in another path
            ann(800, "10.9.0.0/24", &[800, 65100, 777]),
        ]);
        let lens = ReachabilityLens::with_config(&db, tier1_config());

        let result = lens
            .resolve("10.0.0.0/24", &[800], ResolverAlgorithm::TierOne)
            .unwrap();

        assert!(result.paths.is_empty());
        assert_eq!(paths(&result.guessed_paths), vec![vec![800, 65100, 65000]]);
    }

    #[test]
    fn test_tier_one_source_uses_own_fragments() {
        let db = populated_db(vec![ann(900, "10.0.0.0/24", &[900, 65100, 65000])]);
        let lens = ReachabilityLens::with_config(&db, tier1_config());

        let result = lens
            .resolve("10.0.0.0/24", &[65100], ResolverAlgorithm::TierOne)
            .unwrap();
        assert_eq!(paths(&result.guessed_paths), vec![vec![65100, 65000]]);

        // a tier-1 source without fragments of its own yields nothing
        let result = lens
            .resolve("10.0.0.0/24", &[65101], ResolverAlgorithm::TierOne)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier_one_prefers_exact_history() {
        let db = populated_db(vec![ann(800, "10.0.0.0/24", &[800, 65000])]);
        let lens = ReachabilityLens::with_config(&db, tier1_config());

        let result = lens
            .resolve("10.0.0.0/24", &[800], ResolverAlgorithm::TierOne)
            .unwrap();
        assert_eq!(paths(&result.paths), vec![vec![800, 65000]]);
        assert!(result.guessed_paths.is_empty());
    }

    #[test]
    fn test_tier_one_no_fragments_is_empty_not_error() {
        let db = populated_db(vec![ann(900, "10.0.0.0/24", &[900, 65000])]);
        let lens = ReachabilityLens::with_config(&db, tier1_config());

        // no tier-1 appears in any stored path
        let result = lens
            .resolve("10.0.0.0/24", &[800], ResolverAlgorithm::TierOne)
            .unwrap();
        assert!(result.is_empty());
    }
}
