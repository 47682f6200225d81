//! Route-graph builder
//!
//! Turns a reachability answer into an abstract node/edge description for an
//! external renderer. The builder does no I/O and draws no pixels: it emits
//! nodes and attributed edges, plus a Graphviz DOT serialization of the same
//! description as the hand-off format.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::database::RoaMatch;
use crate::lens::reachability::ReachabilityResult;

/// Role of a node in the route graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// A requested source AS
    Source,
    /// Any other AS on a drawn path
    Transit,
    /// The destination-prefix sentinel
    Destination,
}

/// Line style of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    /// Part of an observed path
    Solid,
    /// Part of an inferred path
    Dashed,
}

/// ROA authorization status of an origin edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginStatus {
    Authorized,
    Unauthorized,
    Unknown,
}

/// A node of the abstract route graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub role: NodeRole,
    pub url: Option<String>,
}

/// An attributed edge of the abstract route graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
    /// Set on edges terminating at the destination when ROA data was given
    pub origin_status: Option<OriginStatus>,
    pub url: Option<String>,
}

/// Abstract graph description handed to an external renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

const DEST_NODE_ID: &str = "dest_prefix";

impl RouteGraph {
    /// Serialize the description to Graphviz DOT text
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph routegraph {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [penwidth=\"1.5\", margin=\"0.02\"];\n");

        for node in &self.nodes {
            let mut attrs = vec![format!("label=\"{}\"", escape(&node.label))];
            match node.role {
                NodeRole::Source => attrs.push("color=\"blue\"".to_string()),
                NodeRole::Destination => attrs.push("color=\"green\"".to_string()),
                NodeRole::Transit => {}
            }
            if let Some(url) = &node.url {
                attrs.push(format!("URL=\"{}\"", escape(url)));
            }
            out.push_str(&format!(
                "    \"{}\" [{}];\n",
                escape(&node.id),
                attrs.join(", ")
            ));
        }

        for edge in &self.edges {
            let mut attrs = Vec::new();
            if edge.style == EdgeStyle::Dashed {
                attrs.push("style=\"dashed\"".to_string());
                attrs.push("color=\"grey\"".to_string());
            }
            match edge.origin_status {
                Some(OriginStatus::Authorized) => {
                    attrs.retain(|a| !a.starts_with("color"));
                    attrs.push("color=\"green\"".to_string());
                }
                Some(OriginStatus::Unauthorized) => {
                    attrs.retain(|a| !a.starts_with("color"));
                    attrs.push("color=\"red\"".to_string());
                }
                Some(OriginStatus::Unknown) | None => {}
            }
            if let Some(url) = &edge.url {
                attrs.push(format!("URL=\"{}\"", escape(url)));
            }

            if attrs.is_empty() {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    escape(&edge.from),
                    escape(&edge.to)
                ));
            } else {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [{}];\n",
                    escape(&edge.from),
                    escape(&edge.to),
                    attrs.join(", ")
                ));
            }
        }

        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Builds route graphs from reachability results
#[derive(Debug, Clone, Default)]
pub struct RouteGraphBuilder {
    link_base: Option<String>,
}

impl RouteGraphBuilder {
    /// Create a builder without hyperlink attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach hyperlinks below the given base URL to nodes and edges
    pub fn with_link_base(mut self, base: impl Into<String>) -> Self {
        self.link_base = Some(base.into());
        self
    }

    /// Build the abstract graph for a reachability result
    ///
    /// Confirmed paths draw solid edges; guessed paths draw dashed edges and
    /// stop extending once they reach an AS already on a confirmed path.
    /// Edges terminating at the destination are annotated with the ROA
    /// status of their origin AS when `valid_origins` is supplied.
    pub fn build(
        &self,
        source_asns: &[u32],
        result: &ReachabilityResult,
        valid_origins: Option<&BTreeMap<u32, BTreeSet<RoaMatch>>>,
    ) -> RouteGraph {
        let confirmed_asns: BTreeSet<u32> = result.paths.iter().flatten().copied().collect();

        let mut graph = GraphState::new(self.link_base.as_deref(), result, source_asns);

        for path in &result.paths {
            for pair in path.windows(2) {
                if pair[0] == pair[1] {
                    continue;
                }
                graph.add_as_edge(pair[0], pair[1], EdgeStyle::Solid);
            }
            if let Some(&origin) = path.last() {
                graph.add_dest_edge(origin, EdgeStyle::Solid, valid_origins);
            }
        }

        for path in &result.guessed_paths {
            let mut reached_dest = true;
            for pair in path.windows(2) {
                if pair[0] == pair[1] {
                    continue;
                }
                graph.add_as_edge(pair[0], pair[1], EdgeStyle::Dashed);
                // a confirmed route onward from here is already drawn
                if confirmed_asns.contains(&pair[1]) {
                    reached_dest = false;
                    break;
                }
            }
            if reached_dest {
                if let Some(&origin) = path.last() {
                    graph.add_dest_edge(origin, EdgeStyle::Dashed, valid_origins);
                }
            }
        }

        graph.finish()
    }
}

/// Accumulates deduplicated nodes and edges during a build
struct GraphState<'a> {
    link_base: Option<&'a str>,
    source_asns: BTreeSet<u32>,
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    seen_edges: HashSet<(String, String)>,
    dest_id: String,
}

impl<'a> GraphState<'a> {
    fn new(link_base: Option<&'a str>, result: &ReachabilityResult, source_asns: &[u32]) -> Self {
        let mut state = Self {
            link_base,
            source_asns: source_asns.iter().copied().collect(),
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            seen_edges: HashSet::new(),
            dest_id: DEST_NODE_ID.to_string(),
        };

        state.nodes.insert(
            state.dest_id.clone(),
            GraphNode {
                id: state.dest_id.clone(),
                label: result.prefix.to_string(),
                role: NodeRole::Destination,
                url: state
                    .link_base
                    .map(|base| format!("{}/?ip_prefix={}", base, result.prefix)),
            },
        );
        // sources are always drawn, even when no path was found for them
        for &asn in source_asns {
            state.ensure_as_node(asn);
        }

        state
    }

    fn ensure_as_node(&mut self, asn: u32) {
        let id = format!("AS{}", asn);
        let role = if self.source_asns.contains(&asn) {
            NodeRole::Source
        } else {
            NodeRole::Transit
        };
        let url = self.link_base.map(|base| format!("{}/asn/{}", base, asn));
        self.nodes.entry(id.clone()).or_insert(GraphNode {
            id,
            label: format!("AS{}", asn),
            role,
            url,
        });
    }

    fn add_as_edge(&mut self, from: u32, to: u32, style: EdgeStyle) {
        self.ensure_as_node(from);
        self.ensure_as_node(to);
        let from_id = format!("AS{}", from);
        let to_id = format!("AS{}", to);
        if !self.seen_edges.insert((from_id.clone(), to_id.clone())) {
            return;
        }
        let url = self.link_base.map(|base| format!("{}/asn/{}", base, to));
        self.edges.push(GraphEdge {
            from: from_id,
            to: to_id,
            style,
            origin_status: None,
            url,
        });
    }

    fn add_dest_edge(
        &mut self,
        origin: u32,
        style: EdgeStyle,
        valid_origins: Option<&BTreeMap<u32, BTreeSet<RoaMatch>>>,
    ) {
        self.ensure_as_node(origin);
        let from_id = format!("AS{}", origin);
        if !self
            .seen_edges
            .insert((from_id.clone(), self.dest_id.clone()))
        {
            return;
        }

        let origin_status = valid_origins.map(|origins| {
            if origins.contains_key(&origin) {
                OriginStatus::Authorized
            } else if origins.is_empty() {
                OriginStatus::Unknown
            } else {
                OriginStatus::Unauthorized
            }
        });

        let url = self
            .link_base
            .zip(self.nodes.get(&self.dest_id))
            .map(|(base, dest)| format!("{}/?ip_prefix={}", base, dest.label));

        self.edges.push(GraphEdge {
            from: from_id,
            to: self.dest_id.clone(),
            style,
            origin_status,
            url,
        });
    }

    fn finish(self) -> RouteGraph {
        RouteGraph {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges,
        }
    }
}
