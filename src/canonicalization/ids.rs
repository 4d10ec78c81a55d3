// src/canonicalization/ids.rs

use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::clustering::components::Cluster;
use crate::clustering::graph::IdentityGraph;

pub const CANONICAL_PREFIX: &str = "PHY_";

/// Most frequent well-formed NPI in the cluster; ties go to the smallest NPI.
pub fn dominant_npi<'g>(graph: &'g IdentityGraph, cluster: &Cluster) -> Option<&'g str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &node in cluster.members() {
        if let Some(npi) = graph.node(node).npi.as_deref() {
            *counts.entry(npi).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(npi, _)| npi)
}

fn random_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", CANONICAL_PREFIX, &hex[..12])
}

/// `PHY_{npi}` when the cluster carries an NPI, otherwise `PHY_` plus 12 random hex chars.
pub fn generate_canonical_id(graph: &IdentityGraph, cluster: &Cluster) -> String {
    match dominant_npi(graph, cluster) {
        Some(npi) => format!("{}{}", CANONICAL_PREFIX, npi),
        None => random_id(),
    }
}

/// `PHY_` followed by exactly ten digits.
pub fn is_npi_based(canonical_id: &str) -> bool {
    canonical_id
        .strip_prefix(CANONICAL_PREFIX)
        .map_or(false, |rest| rest.len() == 10 && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Canonical ids for one set of final clusters. Each id is generated once and
/// shared by the source mapping and the merged entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalAssignment {
    /// Parallel to the clusters the assignment was built from.
    pub cluster_ids: Vec<String>,
    /// source_id -> canonical_id
    pub mapping: BTreeMap<String, String>,
    /// Clusters that received an NPI-based id already given to an earlier cluster.
    pub duplicate_npi_ids: usize,
}

pub fn assign_canonical_ids(graph: &IdentityGraph, clusters: &[Cluster]) -> CanonicalAssignment {
    let mut assignment = CanonicalAssignment::default();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for cluster in clusters {
        let canonical_id = generate_canonical_id(graph, cluster);
        if !seen.insert(canonical_id.clone()) && is_npi_based(&canonical_id) {
            warn!(
                "Canonical id {} assigned to more than one cluster ({} records in this one)",
                canonical_id,
                cluster.len()
            );
            assignment.duplicate_npi_ids += 1;
        }
        for &node in cluster.members() {
            assignment
                .mapping
                .insert(graph.source_id(node).to_string(), canonical_id.clone());
        }
        assignment.cluster_ids.push(canonical_id);
    }

    info!("Assigned canonical IDs to {} clusters", clusters.len());
    assignment
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalIdStats {
    pub total_canonical_ids: usize,
    pub npi_based_ids: usize,
    pub random_based_ids: usize,
    pub total_source_records: usize,
    /// 0.0 when nothing was assigned.
    pub avg_records_per_entity: f64,
    pub duplicate_npi_ids: usize,
}

pub fn canonical_id_stats(assignment: &CanonicalAssignment) -> CanonicalIdStats {
    let distinct: BTreeSet<&str> = assignment.mapping.values().map(String::as_str).collect();
    let npi_based = distinct.iter().filter(|id| is_npi_based(id)).count();
    CanonicalIdStats {
        total_canonical_ids: distinct.len(),
        npi_based_ids: npi_based,
        random_based_ids: distinct.len() - npi_based,
        total_source_records: assignment.mapping.len(),
        avg_records_per_entity: if distinct.is_empty() {
            0.0
        } else {
            assignment.mapping.len() as f64 / distinct.len() as f64
        },
        duplicate_npi_ids: assignment.duplicate_npi_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::components::find_clusters;
    use crate::clustering::graph::build_identity_graph;
    use crate::models::{ConfirmedMatch, NormalizedRecord, SourceType};

    fn rec(id: &str) -> NormalizedRecord {
        NormalizedRecord::new(SourceType::Claims, id, "Kim")
    }

    #[test]
    fn test_npi_based_id_uses_most_common() {
        let records = vec![
            rec("a").with_npi("2222222222"),
            rec("b").with_npi("1111111111"),
            rec("c").with_npi("2222222222"),
        ];
        let matches = vec![ConfirmedMatch::new("a", "b", 0.9), ConfirmedMatch::new("b", "c", 0.9)];
        let graph = build_identity_graph(&records, &matches, None).unwrap();
        let cluster = &find_clusters(&graph)[0];
        assert_eq!(generate_canonical_id(&graph, cluster), "PHY_2222222222");
    }

    #[test]
    fn test_npi_tie_breaks_to_smallest() {
        let records = vec![rec("a").with_npi("2222222222"), rec("b").with_npi("1111111111")];
        let matches = vec![ConfirmedMatch::new("a", "b", 0.9)];
        let graph = build_identity_graph(&records, &matches, None).unwrap();
        let cluster = &find_clusters(&graph)[0];
        assert_eq!(dominant_npi(&graph, cluster), Some("1111111111"));
    }

    #[test]
    fn test_random_id_format() {
        let graph = build_identity_graph(&[rec("a").with_npi("not-an-npi")], &[], None).unwrap();
        let id = generate_canonical_id(&graph, &find_clusters(&graph)[0]);
        assert!(id.starts_with("PHY_"));
        assert_eq!(id.len(), 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!is_npi_based(&id));
    }

    #[test]
    fn test_assignment_and_stats() {
        let records = vec![
            rec("a").with_npi("1234567890"),
            rec("b"),
            rec("c").with_npi("1234567890"),
            rec("d"),
        ];
        // a-b linked, c and d isolated: c shares a's NPI but sits in its own cluster
        let graph =
            build_identity_graph(&records, &[ConfirmedMatch::new("a", "b", 0.9)], None).unwrap();
        let clusters = find_clusters(&graph);
        let assignment = assign_canonical_ids(&graph, &clusters);
        assert_eq!(assignment.cluster_ids.len(), 3);
        assert_eq!(assignment.mapping["a"], "PHY_1234567890");
        assert_eq!(assignment.mapping["b"], "PHY_1234567890");
        assert_eq!(assignment.duplicate_npi_ids, 1);

        let stats = canonical_id_stats(&assignment);
        assert_eq!(stats.total_canonical_ids, 2);
        assert_eq!(stats.npi_based_ids, 1);
        assert_eq!(stats.random_based_ids, 1);
        assert_eq!(stats.total_source_records, 4);
        assert!((stats.avg_records_per_entity - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_on_empty_assignment() {
        let stats = canonical_id_stats(&CanonicalAssignment::default());
        assert_eq!(stats.total_canonical_ids, 0);
        assert_eq!(stats.avg_records_per_entity, 0.0);
    }
}
