// src/clustering/components.rs

use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::clustering::graph::{EdgeKey, IdentityEdge, IdentityGraph, NodeId};

/// One connected component. Members are kept sorted by node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cluster {
    members: Vec<NodeId>,
}

impl Cluster {
    pub fn new(mut members: Vec<NodeId>) -> Self {
        members.sort();
        members.dedup();
        Self { members }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.binary_search(&node).is_ok()
    }

    /// Source ids of the members, sorted.
    pub fn source_ids(&self, graph: &IdentityGraph) -> Vec<String> {
        let mut ids: Vec<String> = self
            .members
            .iter()
            .map(|&n| graph.source_id(n).to_string())
            .collect();
        ids.sort();
        ids
    }
}

fn scope_mask(graph: &IdentityGraph, members: &[NodeId]) -> Vec<bool> {
    let mut mask = vec![false; graph.node_count()];
    for &m in members {
        if let Some(slot) = mask.get_mut(m.0) {
            *slot = true;
        }
    }
    mask
}

/// Iterative DFS components over the nodes in scope, ignoring `skip` edges.
fn collect_components(
    graph: &IdentityGraph,
    roots: &[NodeId],
    in_scope: &[bool],
    skip: &BTreeSet<EdgeKey>,
) -> Vec<Vec<NodeId>> {
    let mut visited = vec![false; graph.node_count()];
    let mut components = Vec::new();

    for &root in roots {
        if visited[root.0] || !in_scope[root.0] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if visited[current.0] {
                continue;
            }
            visited[current.0] = true;
            component.push(current);

            for neighbor in graph.neighbors(current) {
                if !visited[neighbor.0]
                    && in_scope[neighbor.0]
                    && !skip.contains(&EdgeKey::new(current, neighbor))
                {
                    stack.push(neighbor);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components
}

fn sort_clusters(clusters: &mut [Cluster]) {
    clusters.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.members.first().cmp(&b.members.first()))
    });
}

/// All connected components, largest first (ties by smallest member id).
pub fn find_clusters(graph: &IdentityGraph) -> Vec<Cluster> {
    let all: Vec<NodeId> = graph.node_ids().collect();
    let in_scope = vec![true; graph.node_count()];
    let mut clusters: Vec<Cluster> = collect_components(graph, &all, &in_scope, &BTreeSet::new())
        .into_iter()
        .map(Cluster::new)
        .collect();
    sort_clusters(&mut clusters);
    clusters
}

/// Components of the subgraph induced by `members` after dropping `skip` edges.
/// The graph itself is not modified.
pub fn components_within(
    graph: &IdentityGraph,
    members: &[NodeId],
    skip: &BTreeSet<EdgeKey>,
) -> Vec<Cluster> {
    let in_scope = scope_mask(graph, members);
    let mut roots = members.to_vec();
    roots.sort();
    let mut clusters: Vec<Cluster> = collect_components(graph, &roots, &in_scope, skip)
        .into_iter()
        .map(Cluster::new)
        .collect();
    sort_clusters(&mut clusters);
    clusters
}

/// The component containing `source_id`, or `None` for an unknown id.
pub fn cluster_for_node(graph: &IdentityGraph, source_id: &str) -> Option<Cluster> {
    let node = graph.node_id(source_id)?;
    let in_scope = vec![true; graph.node_count()];
    collect_components(graph, &[node], &in_scope, &BTreeSet::new())
        .into_iter()
        .next()
        .map(Cluster::new)
}

pub fn cluster_subgraph_edges(graph: &IdentityGraph, cluster: &Cluster) -> Vec<(EdgeKey, IdentityEdge)> {
    graph.edges_within(cluster.members())
}

struct Frame {
    node: NodeId,
    parent: Option<NodeId>,
    neighbors: Vec<NodeId>,
    next: usize,
}

/// Tarjan low-link over the subgraph induced by `members`.
/// Returns (bridges, articulation points), both sorted.
fn low_link(graph: &IdentityGraph, members: &[NodeId]) -> (Vec<EdgeKey>, Vec<NodeId>) {
    let in_scope = scope_mask(graph, members);
    let scoped_neighbors = |node: NodeId| -> Vec<NodeId> {
        graph.neighbors(node).filter(|n| in_scope[n.0]).collect()
    };

    let mut disc: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut low: Vec<usize> = vec![0; graph.node_count()];
    let mut timer = 0;
    let mut bridges = Vec::new();
    let mut articulation = BTreeSet::new();

    let mut roots = members.to_vec();
    roots.sort();

    for root in roots {
        if disc[root.0].is_some() || !in_scope[root.0] {
            continue;
        }
        disc[root.0] = Some(timer);
        low[root.0] = timer;
        timer += 1;
        let mut root_children = 0;
        let mut stack = vec![Frame {
            node: root,
            parent: None,
            neighbors: scoped_neighbors(root),
            next: 0,
        }];

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let node = frame.node;
            let parent = frame.parent;

            if frame.next < frame.neighbors.len() {
                let next = frame.neighbors[frame.next];
                frame.next += 1;
                if Some(next) == parent {
                    continue;
                }
                match disc[next.0] {
                    Some(d) => low[node.0] = low[node.0].min(d),
                    None => {
                        disc[next.0] = Some(timer);
                        low[next.0] = timer;
                        timer += 1;
                        if node == root {
                            root_children += 1;
                        }
                        stack.push(Frame {
                            node: next,
                            parent: Some(node),
                            neighbors: scoped_neighbors(next),
                            next: 0,
                        });
                    }
                }
                continue;
            }

            stack.pop();
            if let Some(p) = parent {
                low[p.0] = low[p.0].min(low[node.0]);
                let disc_p = disc[p.0].unwrap_or(0);
                if low[node.0] > disc_p {
                    bridges.push(EdgeKey::new(p, node));
                }
                if p != root && low[node.0] >= disc_p {
                    articulation.insert(p);
                }
            }
        }

        if root_children >= 2 {
            articulation.insert(root);
        }
    }

    bridges.sort();
    (bridges, articulation.into_iter().collect())
}

/// Edges whose removal would disconnect the subgraph induced by `members`.
pub fn find_bridges(graph: &IdentityGraph, members: &[NodeId]) -> Vec<EdgeKey> {
    low_link(graph, members).0
}

/// Nodes whose removal would disconnect the subgraph induced by `members`.
pub fn find_articulation_points(graph: &IdentityGraph, members: &[NodeId]) -> Vec<NodeId> {
    low_link(graph, members).1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterSizeDistribution {
    pub total_clusters: usize,
    pub singleton_count: usize,
    pub pair_count: usize,
    /// Sizes 3 to 5.
    pub small_count: usize,
    /// Sizes 6 to 10.
    pub medium_count: usize,
    /// Larger than 10.
    pub large_count: usize,
    pub size_distribution: BTreeMap<usize, usize>,
}

pub fn cluster_size_distribution(clusters: &[Cluster]) -> ClusterSizeDistribution {
    let mut dist = ClusterSizeDistribution {
        total_clusters: clusters.len(),
        ..Default::default()
    };
    for cluster in clusters {
        let size = cluster.len();
        *dist.size_distribution.entry(size).or_insert(0) += 1;
        match size {
            0 => {}
            1 => dist.singleton_count += 1,
            2 => dist.pair_count += 1,
            3..=5 => dist.small_count += 1,
            6..=10 => dist.medium_count += 1,
            _ => dist.large_count += 1,
        }
    }
    dist
}

/// `source_id -> CLUSTER_{index:05}` following the order of `clusters`.
pub fn assign_cluster_ids(graph: &IdentityGraph, clusters: &[Cluster]) -> BTreeMap<String, String> {
    let mut mapping = BTreeMap::new();
    for (idx, cluster) in clusters.iter().enumerate() {
        let cluster_id = format!("CLUSTER_{:05}", idx);
        for &node in cluster.members() {
            mapping.insert(graph.source_id(node).to_string(), cluster_id.clone());
        }
    }
    mapping
}

pub fn log_cluster_sizes(clusters: &[Cluster]) {
    info!("Found {} clusters", clusters.len());
    let sizes: Vec<usize> = clusters.iter().map(Cluster::len).collect();
    if let (Some(min), Some(max)) = (sizes.iter().min(), sizes.iter().max()) {
        info!(
            "Cluster sizes: min={}, max={}, avg={:.1}",
            min,
            max,
            sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
        );
    }
}
