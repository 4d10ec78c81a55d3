// src/pipeline.rs - End-to-end resolution run over an in-memory record set
use anyhow::{Context, Result};
use indicatif::MultiProgress;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::analysis::{
    generate_cluster_report, generate_match_quality_report, ClusterReport, MatchQualityReport,
    Report,
};
use crate::canonicalization::{
    assign_canonical_ids, canonical_id_stats, merge_all_clusters, record_confidences,
    CanonicalIdStats,
};
use crate::clustering::components::{find_clusters, log_cluster_sizes, Cluster};
use crate::clustering::export::{graph_stats, log_graph_stats, GraphStats};
use crate::clustering::graph::{build_identity_graph, IdentityGraph};
use crate::clustering::overmatching::detect_overmatching;
use crate::clustering::pruning::{full_pruning_pipeline, PruningAnomaly, PruningReport};
use crate::clustering::quality::{assess_cluster_quality, log_quality_statistics};
use crate::matching::manager::{find_matches, get_confirmed_matches, MatchingSummary};
use crate::models::{CanonicalPhysician, ClusterQuality, MatchResult, NormalizedRecord};
use crate::utils::config::PipelineConfig;
use crate::utils::constants::ANOMALY_PREFIX;
use crate::utils::progress_bars::logging::{PipelineStage, StageLogger};
use crate::utils::progress_bars::stage_bar;

/// A final cluster with its canonical id and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCluster {
    pub canonical_id: String,
    pub source_ids: Vec<String>,
    pub quality: ClusterQuality,
}

/// Everything a resolution run hands to its callers.
#[derive(Debug, Clone)]
pub struct ResolutionOutput {
    pub match_results: Vec<MatchResult>,
    pub matching_summary: MatchingSummary,
    pub confirmed_matches: usize,
    /// The pruned graph.
    pub graph: IdentityGraph,
    pub clusters: Vec<ResolvedCluster>,
    /// source_id -> canonical_id
    pub canonical_mapping: BTreeMap<String, String>,
    pub canonical_physicians: Vec<CanonicalPhysician>,
    /// source_id -> confidence that the record belongs to its entity
    pub record_confidences: BTreeMap<String, f64>,
    pub canonical_id_stats: CanonicalIdStats,
    pub pruning_report: PruningReport,
    pub initial_graph_stats: GraphStats,
    pub final_graph_stats: GraphStats,
    pub match_quality_report: Report<MatchQualityReport>,
    pub cluster_report: Report<ClusterReport>,
    /// Phase name -> seconds
    pub phase_times: BTreeMap<String, f64>,
}

/// Quality snapshot plus overmatching warnings and any pruning anomaly that
/// touched one of the cluster's records.
pub fn cluster_diagnostics(
    graph: &IdentityGraph,
    cluster: &Cluster,
    anomalies: &[PruningAnomaly],
    weak_bridge_threshold: f64,
) -> ClusterQuality {
    let mut quality = assess_cluster_quality(graph, cluster);
    quality
        .warnings
        .extend(detect_overmatching(graph, cluster, weak_bridge_threshold));

    let source_ids = cluster.source_ids(graph);
    for anomaly in anomalies {
        if source_ids.iter().any(|id| anomaly.affects(id)) {
            quality.warnings.push(format!("{} {}", ANOMALY_PREFIX, anomaly));
        }
    }
    quality
}

/// Blocking, scoring, graph construction, pruning, clustering, quality
/// assessment and canonicalization, in that order.
pub fn run_resolution(
    records: &[NormalizedRecord],
    config: &PipelineConfig,
    multi_progress: Option<MultiProgress>,
) -> Result<ResolutionOutput> {
    config.validate().context("Invalid pipeline configuration")?;

    let main_pb = stage_bar(multi_progress.as_ref(), 5, "Matching records...");
    let mut phase_times = BTreeMap::new();

    // Phase 1: matching
    let phase_start = Instant::now();
    let match_results = find_matches(records, config, multi_progress.clone())
        .context("Failed to score candidate pairs")?;
    let matching_summary = MatchingSummary::from_results(&match_results);
    let confirmed = get_confirmed_matches(&match_results, config.include_uncertain_matches);
    phase_times.insert("matching".to_string(), phase_start.elapsed().as_secs_f64());
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Building identity graph...");
    }

    // Phase 2: graph
    let phase_start = Instant::now();
    let graph_logger = StageLogger::new(PipelineStage::GraphBuild);
    graph_logger.log_start(&format!(
        "{} records, {} confirmed matches",
        records.len(),
        confirmed.len()
    ));
    let mut graph = build_identity_graph(records, &confirmed, multi_progress.clone())
        .context("Failed to build identity graph")?;
    let initial_graph_stats = graph_stats(&graph);
    log_graph_stats("Initial", &initial_graph_stats);
    graph_logger.log_completion(&format!(
        "{} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    ));
    phase_times.insert("graph_build".to_string(), phase_start.elapsed().as_secs_f64());
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Pruning...");
    }

    // Phase 3: pruning
    let phase_start = Instant::now();
    let pruning_report = full_pruning_pipeline(&mut graph, config, multi_progress.clone());
    let final_graph_stats = graph_stats(&graph);
    log_graph_stats("Pruned", &final_graph_stats);
    phase_times.insert("pruning".to_string(), phase_start.elapsed().as_secs_f64());
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Clustering...");
    }

    // Phase 4: clustering and quality
    let phase_start = Instant::now();
    let cluster_logger = StageLogger::new(PipelineStage::Clustering);
    cluster_logger.log_start(&format!("{} nodes", graph.node_count()));
    let clusters = find_clusters(&graph);
    log_cluster_sizes(&clusters);
    cluster_logger.log_completion(&format!("{} clusters", clusters.len()));

    let quality_logger = StageLogger::new(PipelineStage::Quality);
    quality_logger.log_start(&format!("{} clusters", clusters.len()));
    let qualities: Vec<ClusterQuality> = clusters
        .iter()
        .map(|c| {
            cluster_diagnostics(
                &graph,
                c,
                &pruning_report.anomalies,
                config.weak_bridge_threshold,
            )
        })
        .collect();
    log_quality_statistics(&qualities);
    let flagged = qualities.iter().filter(|q| q.has_issues()).count();
    if flagged > 0 {
        quality_logger.log_warning(&format!("{} clusters carry warnings", flagged));
    }
    quality_logger.log_completion(&format!("{} clusters assessed", qualities.len()));
    phase_times.insert("clustering".to_string(), phase_start.elapsed().as_secs_f64());
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Canonicalizing...");
    }

    // Phase 5: canonicalization
    let phase_start = Instant::now();
    let canon_logger = StageLogger::new(PipelineStage::Canonicalization);
    canon_logger.log_start(&format!("{} clusters", clusters.len()));
    let assignment = assign_canonical_ids(&graph, &clusters);
    let id_stats = canonical_id_stats(&assignment);
    let canonical_physicians = merge_all_clusters(&graph, &clusters, &assignment.cluster_ids);
    let confidences = record_confidences(&graph, &clusters);
    canon_logger.log_completion(&format!(
        "{} canonical ids ({} NPI-based, {} random)",
        id_stats.total_canonical_ids, id_stats.npi_based_ids, id_stats.random_based_ids
    ));
    phase_times.insert(
        "canonicalization".to_string(),
        phase_start.elapsed().as_secs_f64(),
    );

    let match_quality_report = generate_match_quality_report(&match_results);
    let cluster_report =
        generate_cluster_report(&graph, &clusters, &qualities, &canonical_physicians);

    let resolved: Vec<ResolvedCluster> = clusters
        .iter()
        .zip(assignment.cluster_ids.iter())
        .zip(qualities)
        .map(|((cluster, canonical_id), quality)| ResolvedCluster {
            canonical_id: canonical_id.clone(),
            source_ids: cluster.source_ids(&graph),
            quality,
        })
        .collect();

    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.finish_with_message(format!(
            "Resolved {} records into {} physicians",
            records.len(),
            canonical_physicians.len()
        ));
    }
    info!(
        "Resolution finished: {} records -> {} canonical physicians",
        records.len(),
        canonical_physicians.len()
    );

    Ok(ResolutionOutput {
        confirmed_matches: confirmed.len(),
        match_results,
        matching_summary,
        graph,
        clusters: resolved,
        canonical_mapping: assignment.mapping,
        canonical_physicians,
        record_confidences: confidences,
        canonical_id_stats: id_stats,
        pruning_report,
        initial_graph_stats,
        final_graph_stats,
        match_quality_report,
        cluster_report,
        phase_times,
    })
}
