// src/canonicalization/merge.rs

use log::info;
use std::collections::{BTreeMap, BTreeSet};

use crate::canonicalization::confidence::entity_confidence;
use crate::canonicalization::ids::dominant_npi;
use crate::clustering::components::Cluster;
use crate::clustering::graph::{IdentityGraph, IdentityNode};
use crate::models::core::non_blank;
use crate::models::CanonicalPhysician;

/// Occurrence count and best source priority for one candidate value.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    count: usize,
    best_priority: u8,
}

fn tally<'a, F>(nodes: &[&'a IdentityNode], field: F) -> BTreeMap<&'a str, Tally>
where
    F: Fn(&'a IdentityNode) -> Option<&'a str>,
{
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for node in nodes {
        if let Some(value) = non_blank(field(*node)) {
            let entry = tallies.entry(value).or_default();
            entry.count += 1;
            entry.best_priority = entry.best_priority.max(node.source.priority());
        }
    }
    tallies
}

/// Highest count, then highest source priority, then the smallest value.
fn most_common_by_priority(tallies: &BTreeMap<&str, Tally>) -> Option<String> {
    tallies
        .iter()
        .max_by(|(va, a), (vb, b)| {
            a.count
                .cmp(&b.count)
                .then(a.best_priority.cmp(&b.best_priority))
                .then_with(|| vb.cmp(va))
        })
        .map(|(v, _)| v.to_string())
}

/// Highest count, then the smallest value.
fn most_common(tallies: &BTreeMap<&str, Tally>) -> Option<String> {
    tallies
        .iter()
        .max_by(|(va, a), (vb, b)| a.count.cmp(&b.count).then_with(|| vb.cmp(va)))
        .map(|(v, _)| v.to_string())
}

/// Longest name from the highest-priority source.
fn best_name(nodes: &[&IdentityNode]) -> Option<String> {
    nodes
        .iter()
        .filter_map(|n| non_blank(n.name.as_deref()).map(|name| (n.source.priority(), name)))
        .max_by(|(pa, a), (pb, b)| {
            pa.cmp(pb)
                .then(a.len().cmp(&b.len()))
                .then_with(|| b.cmp(a))
        })
        .map(|(_, name)| name.to_string())
}

/// Groups specialties by their upper-cased form, picks the most frequent group,
/// and returns that group's spelling from the highest-priority source.
fn best_specialty(nodes: &[&IdentityNode]) -> Option<String> {
    let mut groups: BTreeMap<String, Vec<(u8, &str)>> = BTreeMap::new();
    for node in nodes {
        if let Some(raw) = non_blank(node.specialty.as_deref()) {
            groups
                .entry(raw.to_uppercase())
                .or_default()
                .push((node.source.priority(), raw));
        }
    }

    let (_, variants) = groups.iter().max_by(|(ka, a), (kb, b)| {
        let pa = a.iter().map(|(p, _)| *p).max();
        let pb = b.iter().map(|(p, _)| *p).max();
        a.len().cmp(&b.len()).then(pa.cmp(&pb)).then_with(|| kb.cmp(ka))
    })?;

    variants
        .iter()
        .max_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| b.cmp(a)))
        .map(|(_, raw)| raw.to_string())
}

/// Collapses a cluster into one canonical physician.
pub fn merge_cluster_attributes(
    graph: &IdentityGraph,
    cluster: &Cluster,
    canonical_id: &str,
) -> CanonicalPhysician {
    let nodes: Vec<&IdentityNode> = cluster.members().iter().map(|&m| graph.node(m)).collect();

    let facilities = tally(&nodes, |n| n.facility_name.as_deref());
    let cities = tally(&nodes, |n| n.city.as_deref());
    let states = tally(&nodes, |n| n.state.as_deref());

    let all_facilities: BTreeSet<&str> = facilities.keys().copied().collect();
    let source_records = cluster.source_ids(graph);

    CanonicalPhysician {
        canonical_id: canonical_id.to_string(),
        confidence: entity_confidence(graph, cluster),
        npi: dominant_npi(graph, cluster).map(str::to_string),
        name: best_name(&nodes),
        specialty: best_specialty(&nodes),
        primary_facility: most_common_by_priority(&facilities),
        city: most_common(&cities),
        state: most_common(&states),
        all_facilities: all_facilities.into_iter().map(str::to_string).collect(),
        source_count: source_records.len(),
        source_records,
    }
}

/// One canonical physician per cluster. `canonical_ids` is parallel to `clusters`.
pub fn merge_all_clusters(
    graph: &IdentityGraph,
    clusters: &[Cluster],
    canonical_ids: &[String],
) -> Vec<CanonicalPhysician> {
    let physicians: Vec<CanonicalPhysician> = clusters
        .iter()
        .zip(canonical_ids)
        .map(|(cluster, id)| merge_cluster_attributes(graph, cluster, id))
        .collect();

    if !physicians.is_empty() {
        let with_npi = physicians.iter().filter(|p| p.npi.is_some()).count();
        let total_sources: usize = physicians.iter().map(|p| p.source_count).sum();
        info!(
            "Merged {} canonical physicians ({:.1}% with NPI, {:.2} sources on average)",
            physicians.len(),
            with_npi as f64 / physicians.len() as f64 * 100.0,
            total_sources as f64 / physicians.len() as f64
        );
    }
    physicians
}
