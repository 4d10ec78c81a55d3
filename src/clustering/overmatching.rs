// src/clustering/overmatching.rs

use std::collections::BTreeSet;

use crate::clustering::components::{components_within, find_bridges, Cluster};
use crate::clustering::graph::{EdgeKey, IdentityGraph};
use crate::clustering::quality::{distinct_states, edge_stats};
use crate::utils::constants::{
    LARGE_CLUSTER_NOTICE_SIZE, LARGE_CLUSTER_WARNING_SIZE, MAX_EXPECTED_STATES,
};

/// Specialty pairs that rarely belong to the same physician. Matched by substring.
const INCOMPATIBLE_SPECIALTIES: [[&str; 2]; 5] = [
    ["PEDIATRICS", "GERIATRICS"],
    ["OBSTETRICS", "UROLOGY"],
    ["DERMATOLOGY", "CARDIOLOGY"],
    ["PSYCHIATRY", "ORTHOPEDIC SURGERY"],
    ["OPHTHALMOLOGY", "GASTROENTEROLOGY"],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeakBridge {
    pub key: EdgeKey,
    pub weight: f64,
}

/// Bridges of the cluster lighter than `threshold`.
pub fn find_weak_bridges(graph: &IdentityGraph, cluster: &Cluster, threshold: f64) -> Vec<WeakBridge> {
    find_bridges(graph, cluster.members())
        .into_iter()
        .filter_map(|key| {
            let edge = graph.edge(key.lo(), key.hi())?;
            (edge.weight < threshold).then_some(WeakBridge {
                key,
                weight: edge.weight,
            })
        })
        .collect()
}

/// The components the cluster would fall into if its weak bridges were cut.
/// Advisory only: the graph is left untouched.
pub fn suggest_splits(graph: &IdentityGraph, cluster: &Cluster, threshold: f64) -> Vec<Cluster> {
    let skip: BTreeSet<EdgeKey> = find_weak_bridges(graph, cluster, threshold)
        .into_iter()
        .map(|b| b.key)
        .collect();
    components_within(graph, cluster.members(), &skip)
}

/// Pairs of specialties drawn from opposite sides of an incompatible group.
pub fn find_conflicting_specialties(specialties: &BTreeSet<String>) -> Vec<(String, String)> {
    let specs: Vec<&String> = specialties.iter().collect();
    let mut conflicts = Vec::new();
    for (i, a) in specs.iter().enumerate() {
        for b in &specs[i + 1..] {
            let clash = INCOMPATIBLE_SPECIALTIES.iter().any(|group| {
                let hits_a: Vec<&str> = group.iter().copied().filter(|g| a.contains(g)).collect();
                let hits_b: Vec<&str> = group.iter().copied().filter(|g| b.contains(g)).collect();
                !hits_a.is_empty() && !hits_b.is_empty() && hits_a != hits_b
            });
            if clash {
                conflicts.push(((*a).clone(), (*b).clone()));
            }
        }
    }
    conflicts
}

/// Human-readable warnings for signs that two people were merged.
pub fn detect_overmatching(
    graph: &IdentityGraph,
    cluster: &Cluster,
    weak_bridge_threshold: f64,
) -> Vec<String> {
    let members = cluster.members();
    let mut warnings = Vec::new();

    let npis = graph.distinct_npis(members);
    if npis.len() > 1 {
        warnings.push(format!(
            "CRITICAL: NPI conflict - {} different NPIs: {}",
            npis.len(),
            npis.iter().copied().collect::<Vec<_>>().join(", ")
        ));
    }

    if cluster.len() > LARGE_CLUSTER_WARNING_SIZE {
        warnings.push(format!("WARNING: Very large cluster with {} records", cluster.len()));
    } else if cluster.len() > LARGE_CLUSTER_NOTICE_SIZE {
        warnings.push(format!("NOTICE: Large cluster with {} records", cluster.len()));
    }

    let specialties: BTreeSet<String> = members
        .iter()
        .filter_map(|&m| graph.node(m).specialty.as_deref())
        .map(|s| s.trim().to_uppercase())
        .collect();
    let conflicting = find_conflicting_specialties(&specialties);
    if !conflicting.is_empty() {
        let pairs: Vec<String> = conflicting
            .iter()
            .map(|(a, b)| format!("{} / {}", a, b))
            .collect();
        warnings.push(format!(
            "WARNING: Conflicting specialties found: {}",
            pairs.join("; ")
        ));
    }

    let states = distinct_states(graph, members);
    if states.len() > MAX_EXPECTED_STATES {
        warnings.push(format!(
            "WARNING: Records span {} states: {}",
            states.len(),
            states.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    let weak = find_weak_bridges(graph, cluster, weak_bridge_threshold);
    if !weak.is_empty() {
        warnings.push(format!(
            "WARNING: Cluster connected by {} weak edge(s) that could be false positives",
            weak.len()
        ));
    }

    warnings
}

/// 0.6 * average edge weight + 0.4 * density. Singletons are fully cohesive;
/// a multi-record cluster without edges has none.
pub fn cluster_cohesion(graph: &IdentityGraph, cluster: &Cluster) -> f64 {
    if cluster.len() <= 1 {
        return 1.0;
    }
    let stats = edge_stats(graph, cluster.members());
    if stats.edge_count == 0 {
        return 0.0;
    }
    stats.avg_weight * 0.6 + stats.density * 0.4
}
