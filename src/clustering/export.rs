// src/clustering/export.rs

use log::info;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::clustering::graph::IdentityGraph;

/// Snapshot of the identity graph's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_components: usize,
    pub density: f64,
    pub avg_degree: f64,
}

/// petgraph copy of the identity graph for visualisation consumers. Node
/// weights are source ids and edge weights are match weights; node indices
/// follow the identity graph's node order.
pub fn to_petgraph(graph: &IdentityGraph) -> UnGraph<String, f64> {
    let mut pg = UnGraph::with_capacity(graph.node_count(), graph.edge_count());
    let indices: Vec<NodeIndex> = graph
        .node_ids()
        .map(|id| pg.add_node(graph.source_id(id).to_string()))
        .collect();
    for (key, edge) in graph.edges() {
        pg.add_edge(indices[key.lo().0], indices[key.hi().0], edge.weight);
    }
    pg
}

pub fn graph_stats(graph: &IdentityGraph) -> GraphStats {
    let n = graph.node_count();
    let m = graph.edge_count();
    let num_components = if n == 0 {
        0
    } else {
        connected_components(&to_petgraph(graph))
    };
    let density = if n > 1 {
        2.0 * m as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };
    let avg_degree = if n > 0 { 2.0 * m as f64 / n as f64 } else { 0.0 };
    GraphStats {
        num_nodes: n,
        num_edges: m,
        num_components,
        density,
        avg_degree,
    }
}

pub fn log_graph_stats(label: &str, stats: &GraphStats) {
    info!(
        "🕸️  {} graph: {} nodes, {} edges, {} components (density {:.4}, avg degree {:.2})",
        label, stats.num_nodes, stats.num_edges, stats.num_components, stats.density, stats.avg_degree
    );
}
