// src/clustering/pruning.rs

use indicatif::MultiProgress;
use log::{debug, info, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::clustering::components::{find_bridges, find_clusters, Cluster};
use crate::clustering::graph::{EdgeKey, IdentityGraph, NodeId};
use crate::utils::config::PipelineConfig;
use crate::utils::constants::LOW_CONFIDENCE_FACTOR;
use crate::utils::progress_bars::logging::{PipelineStage, StageLogger};
use crate::utils::progress_bars::stage_bar;

/// A structural problem pruning could not correct. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PruningAnomaly {
    /// The oversized-cluster loop stopped at its iteration cap with this
    /// component still above the size limit.
    IterationCapReached {
        iterations: usize,
        cluster_size: usize,
        source_ids: Vec<String>,
    },
    /// A component holds several NPIs but no edge touching an NPI boundary.
    NoCrossNpiEdge {
        npis: Vec<String>,
        source_ids: Vec<String>,
    },
}

impl PruningAnomaly {
    pub fn source_ids(&self) -> &[String] {
        match self {
            PruningAnomaly::IterationCapReached { source_ids, .. } => source_ids,
            PruningAnomaly::NoCrossNpiEdge { source_ids, .. } => source_ids,
        }
    }

    pub fn affects(&self, source_id: &str) -> bool {
        self.source_ids().binary_search_by(|s| s.as_str().cmp(source_id)).is_ok()
    }
}

impl fmt::Display for PruningAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruningAnomaly::IterationCapReached {
                iterations,
                cluster_size,
                ..
            } => write!(
                f,
                "oversized cluster of {} records left after {} split iterations",
                cluster_size, iterations
            ),
            PruningAnomaly::NoCrossNpiEdge { npis, .. } => write!(
                f,
                "NPI conflict ({}) with no removable cross-NPI edge",
                npis.join(", ")
            ),
        }
    }
}

/// Edge counts removed by each pruning step, plus anything left unresolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PruningReport {
    pub initial_edges: usize,
    pub low_confidence_removed: usize,
    pub npi_conflict_removed: usize,
    pub oversized_removed: usize,
    pub oversized_iterations: usize,
    pub weak_bridges_removed: usize,
    pub final_edges: usize,
    pub anomalies: Vec<PruningAnomaly>,
}

impl PruningReport {
    pub fn total_removed(&self) -> usize {
        self.low_confidence_removed
            + self.npi_conflict_removed
            + self.oversized_removed
            + self.weak_bridges_removed
    }
}

fn sorted_source_ids(graph: &IdentityGraph, cluster: &Cluster) -> Vec<String> {
    cluster.source_ids(graph)
}

fn by_weight_then_key(a: (f64, EdgeKey), b: (f64, EdgeKey)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(&b.1))
}

/// Step 1: drop every edge lighter than `threshold`. Returns the number removed.
pub fn prune_low_confidence_edges(graph: &mut IdentityGraph, threshold: f64) -> usize {
    let doomed: Vec<EdgeKey> = graph
        .edges()
        .filter(|(_, edge)| edge.weight < threshold)
        .map(|(key, _)| key)
        .collect();
    for key in &doomed {
        graph.remove_edge(*key);
    }
    info!(
        "Removed {} low-confidence edges (threshold={:.3})",
        doomed.len(),
        threshold
    );
    doomed.len()
}

/// Weakest edge of `members` that sits on an NPI boundary: endpoints with
/// different NPIs, or exactly one endpoint with an NPI. Direct conflicts win
/// weight ties, then the smaller edge key.
fn weakest_cross_npi_edge(graph: &IdentityGraph, members: &[NodeId]) -> Option<EdgeKey> {
    graph
        .edges_within(members)
        .into_iter()
        .filter_map(|(key, edge)| {
            let lo = graph.node(key.lo()).npi.as_deref();
            let hi = graph.node(key.hi()).npi.as_deref();
            match (lo, hi) {
                (Some(x), Some(y)) if x != y => Some((edge.weight, 0u8, key)),
                (Some(_), None) | (None, Some(_)) => Some((edge.weight, 1u8, key)),
                _ => None,
            }
        })
        .min_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        })
        .map(|(_, _, key)| key)
}

/// Step 2: while any component carries two or more NPIs, cut its weakest
/// NPI-boundary edge and recompute components from scratch.
///
/// Returns the number of edges removed and the components that could not be fixed.
pub fn prune_npi_conflicts(graph: &mut IdentityGraph) -> (usize, Vec<PruningAnomaly>) {
    let mut removed = 0;
    let mut anomalies = Vec::new();
    // Components we could not fix, identified by their smallest member
    let mut stuck: BTreeSet<NodeId> = BTreeSet::new();

    loop {
        let clusters = find_clusters(graph);
        let conflicted = clusters.iter().find(|c| {
            c.members()
                .first()
                .map_or(false, |first| !stuck.contains(first))
                && graph.distinct_npis(c.members()).len() > 1
        });
        let Some(cluster) = conflicted else {
            break;
        };

        match weakest_cross_npi_edge(graph, cluster.members()) {
            Some(key) => {
                debug!(
                    "Removed edge ({}, {}) to resolve NPI conflict",
                    graph.source_id(key.lo()),
                    graph.source_id(key.hi())
                );
                graph.remove_edge(key);
                removed += 1;
            }
            None => {
                let npis: Vec<String> = graph
                    .distinct_npis(cluster.members())
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let anomaly = PruningAnomaly::NoCrossNpiEdge {
                    npis,
                    source_ids: sorted_source_ids(graph, cluster),
                };
                warn!("Pruning anomaly: {}", anomaly);
                if let Some(&first) = cluster.members().first() {
                    stuck.insert(first);
                }
                anomalies.push(anomaly);
            }
        }
    }

    if removed > 0 {
        info!("Resolved NPI conflicts by removing {} edges", removed);
    }
    (removed, anomalies)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OversizedOutcome {
    pub removed: usize,
    pub iterations: usize,
    pub anomalies: Vec<PruningAnomaly>,
}

/// Step 3: each iteration removes the weakest edge of every component larger
/// than `max_size`. Stops when none remain or after `max_iterations`; whatever
/// is still oversized at that point is reported as an anomaly.
pub fn prune_oversized_clusters(
    graph: &mut IdentityGraph,
    max_size: usize,
    max_iterations: usize,
) -> OversizedOutcome {
    let mut outcome = OversizedOutcome::default();

    while outcome.iterations < max_iterations {
        let oversized: Vec<Cluster> = find_clusters(graph)
            .into_iter()
            .filter(|c| c.len() > max_size)
            .collect();
        if oversized.is_empty() {
            break;
        }

        for cluster in &oversized {
            let weakest = graph
                .edges_within(cluster.members())
                .into_iter()
                .map(|(key, edge)| (edge.weight, key))
                .min_by(|a, b| by_weight_then_key(*a, *b));
            if let Some((weight, key)) = weakest {
                debug!(
                    "Removed edge ({}, {}) weight {:.3} from oversized cluster",
                    graph.source_id(key.lo()),
                    graph.source_id(key.hi()),
                    weight
                );
                graph.remove_edge(key);
                outcome.removed += 1;
            }
        }
        outcome.iterations += 1;
    }

    for cluster in find_clusters(graph).iter().filter(|c| c.len() > max_size) {
        let anomaly = PruningAnomaly::IterationCapReached {
            iterations: outcome.iterations,
            cluster_size: cluster.len(),
            source_ids: sorted_source_ids(graph, cluster),
        };
        warn!("Pruning anomaly: {}", anomaly);
        outcome.anomalies.push(anomaly);
    }

    if outcome.iterations > 0 {
        info!(
            "Pruned oversized clusters in {} iterations ({} edges removed)",
            outcome.iterations, outcome.removed
        );
    }
    outcome
}

/// Step 4: in every component of three or more records, remove bridges
/// lighter than `threshold`. Bridges are computed once per component.
pub fn prune_weak_bridges(graph: &mut IdentityGraph, threshold: f64) -> usize {
    let mut doomed = Vec::new();
    for cluster in find_clusters(graph).iter().filter(|c| c.len() > 2) {
        for key in find_bridges(graph, cluster.members()) {
            if let Some(edge) = graph.edge(key.lo(), key.hi()) {
                if edge.weight < threshold {
                    doomed.push((key, edge.weight));
                }
            }
        }
    }
    for (key, weight) in &doomed {
        debug!(
            "Removed weak bridge ({}, {}) with weight {:.3}",
            graph.source_id(key.lo()),
            graph.source_id(key.hi()),
            weight
        );
        graph.remove_edge(*key);
    }
    if !doomed.is_empty() {
        info!("Removed {} weak bridge edges", doomed.len());
    }
    doomed.len()
}

/// Runs the four pruning steps in order, mutating `graph` in place.
pub fn full_pruning_pipeline(
    graph: &mut IdentityGraph,
    config: &PipelineConfig,
    multi_progress: Option<MultiProgress>,
) -> PruningReport {
    let logger = StageLogger::new(PipelineStage::Pruning);
    logger.log_start(&format!(
        "{} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    ));
    let pb = stage_bar(multi_progress.as_ref(), 4, "Pruning identity graph...");
    let step_done = |msg: &str| {
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(msg.to_string());
        }
    };

    let mut report = PruningReport {
        initial_edges: graph.edge_count(),
        ..Default::default()
    };

    report.low_confidence_removed =
        prune_low_confidence_edges(graph, config.min_edge_weight * LOW_CONFIDENCE_FACTOR);
    logger.log_phase(
        "low-confidence edges",
        Some(&format!("{} removed", report.low_confidence_removed)),
    );
    step_done("Low-confidence edges removed");

    if config.prune_npi_conflicts {
        let (removed, anomalies) = prune_npi_conflicts(graph);
        report.npi_conflict_removed = removed;
        report.anomalies.extend(anomalies);
        logger.log_phase("NPI conflicts", Some(&format!("{} removed", removed)));
    } else {
        logger.log_phase("NPI conflicts", Some("skipped (disabled)"));
    }
    step_done("NPI conflicts resolved");

    let oversized = prune_oversized_clusters(
        graph,
        config.max_cluster_size,
        config.max_split_iterations,
    );
    report.oversized_removed = oversized.removed;
    report.oversized_iterations = oversized.iterations;
    report.anomalies.extend(oversized.anomalies);
    logger.log_phase(
        "oversized clusters",
        Some(&format!(
            "{} removed in {} iterations",
            oversized.removed, oversized.iterations
        )),
    );
    step_done("Oversized clusters split");

    report.weak_bridges_removed = prune_weak_bridges(graph, config.min_edge_weight);
    logger.log_phase(
        "weak bridges",
        Some(&format!("{} removed", report.weak_bridges_removed)),
    );
    step_done("Weak bridges removed");

    report.final_edges = graph.edge_count();
    if let Some(pb) = &pb {
        pb.finish_with_message("Pruning complete");
    }
    for anomaly in &report.anomalies {
        logger.log_warning(&anomaly.to_string());
    }
    logger.log_completion(&format!(
        "{} -> {} edges ({} removed, {} anomalies)",
        report.initial_edges,
        report.final_edges,
        report.total_removed(),
        report.anomalies.len()
    ));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::graph::build_identity_graph;
    use crate::models::{ConfirmedMatch, NormalizedRecord, SourceType};

    fn graph_with(nodes: &[(&str, Option<&str>)], edges: &[(&str, &str, f64)]) -> IdentityGraph {
        let records: Vec<NormalizedRecord> = nodes
            .iter()
            .map(|(id, npi)| {
                let r = NormalizedRecord::new(SourceType::Claims, *id, "Smith");
                match npi {
                    Some(n) => r.with_npi(*n),
                    None => r,
                }
            })
            .collect();
        let matches: Vec<ConfirmedMatch> = edges
            .iter()
            .map(|(a, b, w)| ConfirmedMatch::new(*a, *b, *w))
            .collect();
        build_identity_graph(&records, &matches, None).unwrap()
    }

    fn has_edge(graph: &IdentityGraph, a: &str, b: &str) -> bool {
        let (a, b) = (graph.node_id(a).unwrap(), graph.node_id(b).unwrap());
        graph.edge(a, b).is_some()
    }

    const X: &str = "1111111111";
    const Y: &str = "2222222222";

    #[test]
    fn test_low_confidence_threshold_is_strict() {
        let mut graph = graph_with(
            &[("a", None), ("b", None), ("c", None)],
            &[("a", "b", 0.29), ("b", "c", 0.30)],
        );
        assert_eq!(prune_low_confidence_edges(&mut graph, 0.30), 1);
        assert!(!has_edge(&graph, "a", "b"));
        assert!(has_edge(&graph, "b", "c"));
    }

    #[test]
    fn test_npi_conflict_removes_direct_edge() {
        let mut graph = graph_with(&[("a", Some(X)), ("b", Some(Y))], &[("a", "b", 0.9)]);
        let (removed, anomalies) = prune_npi_conflicts(&mut graph);
        assert_eq!(removed, 1);
        assert!(anomalies.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_npi_conflict_through_unknown_node() {
        // a(X) - m(None) - b(Y): the weaker NPI-boundary edge goes
        let mut graph = graph_with(
            &[("a", Some(X)), ("m", None), ("b", Some(Y))],
            &[("a", "m", 0.9), ("m", "b", 0.7)],
        );
        let (removed, anomalies) = prune_npi_conflicts(&mut graph);
        assert_eq!(removed, 1);
        assert!(anomalies.is_empty());
        assert!(has_edge(&graph, "a", "m"));
        assert!(!has_edge(&graph, "m", "b"));
    }

    #[test]
    fn test_npi_conflict_keeps_same_npi_edges() {
        // a(X)=a2(X) weak internal edge must survive; the cut lands on the X/Y boundary
        let mut graph = graph_with(
            &[("a", Some(X)), ("a2", Some(X)), ("b", Some(Y))],
            &[("a", "a2", 0.41), ("a2", "b", 0.8)],
        );
        let (removed, _) = prune_npi_conflicts(&mut graph);
        assert_eq!(removed, 1);
        assert!(has_edge(&graph, "a", "a2"));
        for cluster in find_clusters(&graph) {
            assert!(graph.distinct_npis(cluster.members()).len() <= 1);
        }
    }

    #[test]
    fn test_oversized_split_and_cap_anomaly() {
        let nodes: Vec<(String, Option<&str>)> =
            (0..6).map(|i| (format!("n{}", i), None)).collect();
        let node_refs: Vec<(&str, Option<&str>)> =
            nodes.iter().map(|(id, npi)| (id.as_str(), *npi)).collect();
        let edges = [
            ("n0", "n1", 0.9),
            ("n1", "n2", 0.9),
            ("n2", "n3", 0.5),
            ("n3", "n4", 0.9),
            ("n4", "n5", 0.9),
        ];

        let mut graph = graph_with(&node_refs, &edges);
        let outcome = prune_oversized_clusters(&mut graph, 3, 1000);
        assert_eq!(outcome.removed, 1);
        assert!(outcome.anomalies.is_empty());
        assert!(!has_edge(&graph, "n2", "n3"));

        let mut capped = graph_with(&node_refs, &edges);
        let outcome = prune_oversized_clusters(&mut capped, 1, 1);
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.anomalies.is_empty());
        assert!(matches!(
            outcome.anomalies[0],
            PruningAnomaly::IterationCapReached { iterations: 1, .. }
        ));
    }

    #[test]
    fn test_weak_bridges_only_below_threshold() {
        let mut graph = graph_with(
            &[("a", None), ("b", None), ("c", None), ("d", None)],
            &[("a", "b", 0.9), ("b", "c", 0.35), ("c", "d", 0.45)],
        );
        assert_eq!(prune_weak_bridges(&mut graph, 0.4), 1);
        assert!(!has_edge(&graph, "b", "c"));
        assert!(has_edge(&graph, "c", "d"));
    }

    #[test]
    fn test_weak_bridges_skip_pairs() {
        let mut graph = graph_with(&[("a", None), ("b", None)], &[("a", "b", 0.1)]);
        assert_eq!(prune_weak_bridges(&mut graph, 0.4), 0);
    }

    #[test]
    fn test_full_pipeline_report() {
        let mut graph = graph_with(
            &[("a", Some(X)), ("b", None), ("c", Some(Y)), ("d", None)],
            &[("a", "b", 0.9), ("b", "c", 0.6), ("c", "d", 0.2)],
        );
        let config = PipelineConfig {
            worker_threads: 1,
            ..PipelineConfig::default()
        };
        let report = full_pruning_pipeline(&mut graph, &config, None);
        assert_eq!(report.initial_edges, 3);
        assert_eq!(report.low_confidence_removed, 1);
        assert_eq!(report.npi_conflict_removed, 1);
        assert_eq!(report.final_edges, 1);
        assert_eq!(report.total_removed(), 2);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_anomaly_membership() {
        let anomaly = PruningAnomaly::NoCrossNpiEdge {
            npis: vec![X.to_string(), Y.to_string()],
            source_ids: vec!["a".to_string(), "c".to_string()],
        };
        assert!(anomaly.affects("c"));
        assert!(!anomaly.affects("b"));
        assert!(anomaly.to_string().contains(X));
    }
}
