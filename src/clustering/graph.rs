// src/clustering/graph.rs

use anyhow::{bail, Result};
use indicatif::MultiProgress;
use log::info;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{ConfirmedMatch, MatchType, NormalizedRecord, SourceType};
use crate::utils::progress_bars::stage_bar;

/// Index of a node in the identity graph. Stable for the life of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Unordered node pair, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(NodeId, NodeId);

impl EdgeKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            EdgeKey(a, b)
        } else {
            EdgeKey(b, a)
        }
    }

    pub fn lo(&self) -> NodeId {
        self.0
    }

    pub fn hi(&self) -> NodeId {
        self.1
    }

    pub fn other(&self, node: NodeId) -> NodeId {
        if node == self.0 {
            self.1
        } else {
            self.0
        }
    }
}

/// Attributes of a source record captured when the graph is built.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityNode {
    pub source_id: String,
    pub source: SourceType,
    /// Well-formed NPI only. Malformed values are dropped at build time.
    pub npi: Option<String>,
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub facility_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl IdentityNode {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        use crate::models::core::non_blank;
        Self {
            source_id: record.source_id.clone(),
            source: record.source,
            npi: record.valid_npi().map(str::to_string),
            name: record.display_name(),
            specialty: non_blank(record.specialty.as_deref()).map(str::to_string),
            facility_name: non_blank(record.facility_name.as_deref()).map(str::to_string),
            city: non_blank(record.facility_city.as_deref()).map(str::to_string),
            state: record.state().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityEdge {
    pub weight: f64,
    pub match_type: MatchType,
}

/// Weighted undirected graph of source records.
///
/// Nodes are never removed; pruning only deletes edges. Adjacency and the
/// edge table are ordered collections so that every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct IdentityGraph {
    nodes: Vec<IdentityNode>,
    index: HashMap<String, NodeId>,
    adjacency: Vec<BTreeSet<NodeId>>,
    edges: BTreeMap<EdgeKey, IdentityEdge>,
}

impl IdentityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when the `source_id` is already present.
    pub fn add_node(&mut self, node: IdentityNode) -> Result<NodeId> {
        if self.index.contains_key(&node.source_id) {
            bail!("Duplicate source_id '{}' in identity graph", node.source_id);
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(node.source_id.clone(), id);
        self.nodes.push(node);
        self.adjacency.push(BTreeSet::new());
        Ok(id)
    }

    /// Adds or replaces the edge between `a` and `b`.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, edge: IdentityEdge) -> Result<()> {
        if a == b {
            bail!(
                "Self-loop on '{}' is not a valid match",
                self.nodes.get(a.0).map(|n| n.source_id.as_str()).unwrap_or("?")
            );
        }
        if a.0 >= self.nodes.len() || b.0 >= self.nodes.len() {
            bail!("Edge endpoint out of range: {:?}-{:?}", a, b);
        }
        if !edge.weight.is_finite() || !(0.0..=1.0).contains(&edge.weight) {
            bail!(
                "Edge weight {} between '{}' and '{}' is outside [0, 1]",
                edge.weight,
                self.nodes[a.0].source_id,
                self.nodes[b.0].source_id
            );
        }
        self.adjacency[a.0].insert(b);
        self.adjacency[b.0].insert(a);
        self.edges.insert(EdgeKey::new(a, b), edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, key: EdgeKey) -> Option<IdentityEdge> {
        let removed = self.edges.remove(&key)?;
        self.adjacency[key.lo().0].remove(&key.hi());
        self.adjacency[key.hi().0].remove(&key.lo());
        Some(removed)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &IdentityNode {
        &self.nodes[id.0]
    }

    pub fn node_id(&self, source_id: &str) -> Option<NodeId> {
        self.index.get(source_id).copied()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency[id.0].iter().copied()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency[id.0].len()
    }

    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&IdentityEdge> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &IdentityEdge)> + '_ {
        self.edges.iter().map(|(k, e)| (*k, e))
    }

    /// Edges with both endpoints in `members`, in key order.
    pub fn edges_within(&self, members: &[NodeId]) -> Vec<(EdgeKey, IdentityEdge)> {
        let member_set: BTreeSet<NodeId> = members.iter().copied().collect();
        let mut found = Vec::new();
        for &node in &member_set {
            for &neighbor in &self.adjacency[node.0] {
                if node < neighbor && member_set.contains(&neighbor) {
                    let key = EdgeKey::new(node, neighbor);
                    if let Some(edge) = self.edges.get(&key) {
                        found.push((key, *edge));
                    }
                }
            }
        }
        found
    }

    pub fn source_id(&self, id: NodeId) -> &str {
        &self.nodes[id.0].source_id
    }

    /// Distinct well-formed NPIs carried by `members`.
    pub fn distinct_npis(&self, members: &[NodeId]) -> BTreeSet<&str> {
        members
            .iter()
            .filter_map(|&m| self.nodes[m.0].npi.as_deref())
            .collect()
    }
}

/// Edge label from NPI agreement and weight magnitude.
pub fn edge_match_type(a: &IdentityNode, b: &IdentityNode, weight: f64) -> MatchType {
    match (&a.npi, &b.npi) {
        (Some(x), Some(y)) if x == y => MatchType::NpiExact,
        _ if weight >= 0.85 => MatchType::NameStrong,
        _ if weight >= 0.6 => MatchType::NameModerate,
        _ => MatchType::Weak,
    }
}

/// One node per record, one edge per confirmed match.
///
/// Fails on duplicate source ids, self-loops, out-of-range weights and
/// matches that reference a source id with no record.
pub fn build_identity_graph(
    records: &[NormalizedRecord],
    matches: &[ConfirmedMatch],
    multi_progress: Option<MultiProgress>,
) -> Result<IdentityGraph> {
    let mut graph = IdentityGraph::new();
    for record in records {
        graph.add_node(IdentityNode::from_record(record))?;
    }
    info!("Added {} nodes to graph", graph.node_count());

    let pb = stage_bar(multi_progress.as_ref(), matches.len() as u64, "Adding match edges...");

    for m in matches {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        let Some(a) = graph.node_id(&m.source_id_1) else {
            bail!(
                "Confirmed match references unknown source_id '{}'",
                m.source_id_1
            );
        };
        let Some(b) = graph.node_id(&m.source_id_2) else {
            bail!(
                "Confirmed match references unknown source_id '{}'",
                m.source_id_2
            );
        };
        let match_type = edge_match_type(graph.node(a), graph.node(b), m.weight);
        graph.add_edge(
            a,
            b,
            IdentityEdge {
                weight: m.weight,
                match_type,
            },
        )?;
    }

    if let Some(pb) = &pb {
        pb.finish_with_message(format!(
            "Graph built: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        ));
    }
    info!("Added {} edges to graph", graph.edge_count());

    Ok(graph)
}
