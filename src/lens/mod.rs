//! Lens module: high-level query logic over the topology store
//!
//! - **reachability**: AS-to-prefix path resolution (exact history with
//!   strategy-specific guessing)
//! - **graph**: abstract route-graph building and DOT serialization

pub mod graph;
pub mod reachability;

pub use graph::{
    EdgeStyle, GraphEdge, GraphNode, NodeRole, OriginStatus, RouteGraph, RouteGraphBuilder,
};
pub use reachability::{
    CollectorResolver, PathResolver, ReachabilityLens, ReachabilityResult, ResolverAlgorithm,
    ResolverConfig, SourcePaths, TierOneResolver, DEFAULT_MAX_EXPLORED_ASNS, DEFAULT_TIER1_ASNS,
};
