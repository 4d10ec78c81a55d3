// src/canonicalization/confidence.rs

use log::info;
use std::collections::{BTreeMap, BTreeSet};

use crate::clustering::components::Cluster;
use crate::clustering::graph::{IdentityGraph, NodeId};
use crate::clustering::quality::edge_stats;

/// Confidence that the cluster is one physician.
///
/// A singleton gets its source's base rate. Larger clusters blend edge
/// weights, density, NPI consistency and the number of distinct sources.
pub fn entity_confidence(graph: &IdentityGraph, cluster: &Cluster) -> f64 {
    let members = cluster.members();
    match members {
        [] => return 0.0,
        [only] => return graph.node(*only).source.base_confidence(),
        _ => {}
    }

    let stats = edge_stats(graph, members);
    if stats.edge_count == 0 {
        return 0.3;
    }

    let npi_score = if graph.distinct_npis(members).len() <= 1 {
        1.0
    } else {
        0.3
    };
    let sources: BTreeSet<_> = members.iter().map(|&m| graph.node(m).source).collect();
    let source_diversity = (sources.len() as f64 / 3.0).min(1.0);

    let confidence = stats.avg_weight * 0.30
        + stats.min_weight * 0.15
        + stats.density * 0.15
        + npi_score * 0.25
        + source_diversity * 0.15;
    confidence.clamp(0.0, 1.0)
}

/// Confidence that `node` belongs in `cluster`, from its direct edges to peers.
pub fn record_confidence(graph: &IdentityGraph, node: NodeId, cluster: &Cluster) -> f64 {
    if !cluster.contains(node) {
        return 0.0;
    }
    if cluster.len() == 1 {
        return 0.8;
    }

    let weights: Vec<f64> = graph
        .neighbors(node)
        .filter(|n| cluster.contains(*n))
        .filter_map(|n| graph.edge(node, n).map(|e| e.weight))
        .collect();
    if weights.is_empty() {
        // Only reachable through other members
        return 0.4;
    }

    let avg = weights.iter().sum::<f64>() / weights.len() as f64;
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (avg * 0.6 + max * 0.4).clamp(0.0, 1.0)
}

/// `source_id -> confidence` for every record in `clusters`.
pub fn record_confidences(graph: &IdentityGraph, clusters: &[Cluster]) -> BTreeMap<String, f64> {
    let mut confidences = BTreeMap::new();
    for cluster in clusters {
        for &node in cluster.members() {
            confidences.insert(
                graph.source_id(node).to_string(),
                record_confidence(graph, node, cluster),
            );
        }
    }
    info!("Calculated record confidences for {} records", confidences.len());
    confidences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::components::find_clusters;
    use crate::clustering::graph::build_identity_graph;
    use crate::models::{ConfirmedMatch, NormalizedRecord, SourceType};

    #[test]
    fn test_singleton_uses_source_base_rate() {
        let records = vec![
            NormalizedRecord::new(SourceType::Publication, "p1", "Chen"),
            NormalizedRecord::new(SourceType::Claims, "c1", "Wu"),
        ];
        let graph = build_identity_graph(&records, &[], None).unwrap();
        let clusters = find_clusters(&graph);
        let by_id = |id: &str| {
            let node = graph.node_id(id).unwrap();
            clusters.iter().find(|c| c.contains(node)).unwrap().clone()
        };
        assert_eq!(entity_confidence(&graph, &by_id("p1")), 0.50);
        assert_eq!(entity_confidence(&graph, &by_id("c1")), 0.85);
        let node = graph.node_id("c1").unwrap();
        assert_eq!(record_confidence(&graph, node, &by_id("c1")), 0.8);
    }

    #[test]
    fn test_multi_record_confidence_formula() {
        let records = vec![
            NormalizedRecord::new(SourceType::Claims, "a", "Chen").with_npi("1234567890"),
            NormalizedRecord::new(SourceType::License, "b", "Chen"),
            NormalizedRecord::new(SourceType::License, "c", "Chen"),
        ];
        let matches = vec![ConfirmedMatch::new("a", "b", 0.9), ConfirmedMatch::new("b", "c", 0.7)];
        let graph = build_identity_graph(&records, &matches, None).unwrap();
        let cluster = &find_clusters(&graph)[0];

        let expected = 0.8 * 0.30 + 0.7 * 0.15 + (2.0 / 3.0) * 0.15 + 1.0 * 0.25 + (2.0 / 3.0) * 0.15;
        assert!((entity_confidence(&graph, cluster) - expected).abs() < 1e-9);

        let b = graph.node_id("b").unwrap();
        let c = graph.node_id("c").unwrap();
        assert!((record_confidence(&graph, b, cluster) - (0.8 * 0.6 + 0.9 * 0.4)).abs() < 1e-9);
        assert!((record_confidence(&graph, c, cluster) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_edgeless_and_transitive_cases() {
        let records = vec![
            NormalizedRecord::new(SourceType::Claims, "a", "Chen"),
            NormalizedRecord::new(SourceType::Claims, "b", "Chen"),
        ];
        let graph = build_identity_graph(&records, &[], None).unwrap();
        let forced = Cluster::new(graph.node_ids().collect());
        assert_eq!(entity_confidence(&graph, &forced), 0.3);
        let a = graph.node_id("a").unwrap();
        assert_eq!(record_confidence(&graph, a, &forced), 0.4);
    }

    #[test]
    fn test_record_confidences_cover_every_record() {
        let records = vec![
            NormalizedRecord::new(SourceType::Claims, "a", "Chen"),
            NormalizedRecord::new(SourceType::License, "b", "Chen"),
            NormalizedRecord::new(SourceType::License, "c", "Ng"),
        ];
        let graph =
            build_identity_graph(&records, &[ConfirmedMatch::new("a", "b", 0.9)], None).unwrap();
        let confidences = record_confidences(&graph, &find_clusters(&graph));
        assert_eq!(confidences.len(), 3);
        assert_eq!(confidences["c"], 0.8);
        assert!((confidences["a"] - 0.9).abs() < 1e-9);
    }
}
