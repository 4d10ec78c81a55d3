// src/analysis/cluster_report.rs

use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{score_stats, Report, ScoreStats};
use crate::clustering::components::{cluster_size_distribution, Cluster, ClusterSizeDistribution};
use crate::clustering::graph::IdentityGraph;
use crate::clustering::quality::{quality_summary, QualitySummary};
use crate::models::{CanonicalPhysician, ClusterQuality};

const SAMPLE_ISSUE_LIMIT: usize = 10;
const TOP_VALUE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeAnalysis {
    pub total_clusters: usize,
    pub total_records: usize,
    pub size_stats: ScoreStats,
    pub distribution: ClusterSizeDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSample {
    pub cluster_id: String,
    pub size: usize,
    pub quality_score: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityAnalysis {
    pub summary: QualitySummary,
    pub problematic_clusters: usize,
    pub sample_issues: Vec<IssueSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCoverage {
    /// Number of distinct source types -> cluster count.
    pub distribution: BTreeMap<usize, usize>,
    pub multi_source_clusters: usize,
    pub single_source_clusters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicianAnalysis {
    pub total_physicians: usize,
    pub npi_coverage: f64,
    /// >= 0.8
    pub high_confidence: usize,
    /// 0.5 to 0.8
    pub medium_confidence: usize,
    /// < 0.5
    pub low_confidence: usize,
    pub confidence_stats: ScoreStats,
    pub source_record_stats: ScoreStats,
    pub top_states: Vec<(String, usize)>,
    pub top_specialties: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub size_analysis: SizeAnalysis,
    pub quality_analysis: Report<QualityAnalysis>,
    pub source_coverage: SourceCoverage,
    pub physician_analysis: Report<PhysicianAnalysis>,
}

pub fn analyze_cluster_sizes(clusters: &[Cluster]) -> Report<SizeAnalysis> {
    let sizes: Vec<f64> = clusters.iter().map(|c| c.len() as f64).collect();
    let Some(size_stats) = score_stats(&sizes) else {
        return Report::no_data("No clusters provided");
    };
    Report::Ready(SizeAnalysis {
        total_clusters: clusters.len(),
        total_records: clusters.iter().map(Cluster::len).sum(),
        size_stats,
        distribution: cluster_size_distribution(clusters),
    })
}

/// `qualities` is parallel to the cluster list; samples are labelled `CLUSTER_{index:05}`.
pub fn analyze_cluster_quality(qualities: &[ClusterQuality]) -> Report<QualityAnalysis> {
    let Some(summary) = quality_summary(qualities) else {
        return Report::no_data("No cluster quality data");
    };
    let problematic: Vec<(usize, &ClusterQuality)> = qualities
        .iter()
        .enumerate()
        .filter(|(_, q)| q.has_issues())
        .collect();
    Report::Ready(QualityAnalysis {
        summary,
        problematic_clusters: problematic.len(),
        sample_issues: problematic
            .iter()
            .take(SAMPLE_ISSUE_LIMIT)
            .map(|(idx, q)| IssueSample {
                cluster_id: format!("CLUSTER_{:05}", idx),
                size: q.size,
                quality_score: q.quality_score,
                warnings: q.warnings.clone(),
            })
            .collect(),
    })
}

pub fn analyze_source_coverage(graph: &IdentityGraph, clusters: &[Cluster]) -> SourceCoverage {
    let mut distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for cluster in clusters {
        let sources: BTreeSet<_> = cluster
            .members()
            .iter()
            .map(|&m| graph.node(m).source)
            .collect();
        *distribution.entry(sources.len()).or_insert(0) += 1;
    }
    SourceCoverage {
        multi_source_clusters: distribution.iter().filter(|(k, _)| **k > 1).map(|(_, v)| v).sum(),
        single_source_clusters: distribution.get(&1).copied().unwrap_or(0),
        distribution,
    }
}

/// Most common values, ties broken alphabetically.
fn top_values<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_VALUE_LIMIT)
        .map(|(v, c)| (v.to_string(), c))
        .collect()
}

pub fn analyze_canonical_physicians(physicians: &[CanonicalPhysician]) -> Report<PhysicianAnalysis> {
    let confidences: Vec<f64> = physicians.iter().map(|p| p.confidence).collect();
    let source_counts: Vec<f64> = physicians.iter().map(|p| p.source_count as f64).collect();
    let (Some(confidence_stats), Some(source_record_stats)) =
        (score_stats(&confidences), score_stats(&source_counts))
    else {
        return Report::no_data("No physicians provided");
    };

    let with_npi = physicians.iter().filter(|p| p.npi.is_some()).count();
    Report::Ready(PhysicianAnalysis {
        total_physicians: physicians.len(),
        npi_coverage: with_npi as f64 / physicians.len() as f64,
        high_confidence: confidences.iter().filter(|&&c| c >= 0.8).count(),
        medium_confidence: confidences.iter().filter(|&&c| (0.5..0.8).contains(&c)).count(),
        low_confidence: confidences.iter().filter(|&&c| c < 0.5).count(),
        confidence_stats,
        source_record_stats,
        top_states: top_values(physicians.iter().filter_map(|p| p.state.as_deref())),
        top_specialties: top_values(physicians.iter().filter_map(|p| p.specialty.as_deref())),
    })
}

pub fn generate_cluster_report(
    graph: &IdentityGraph,
    clusters: &[Cluster],
    qualities: &[ClusterQuality],
    physicians: &[CanonicalPhysician],
) -> Report<ClusterReport> {
    let size_analysis = match analyze_cluster_sizes(clusters) {
        Report::Ready(analysis) => analysis,
        Report::NoData { reason } => return Report::NoData { reason },
    };

    let report = ClusterReport {
        size_analysis,
        quality_analysis: analyze_cluster_quality(qualities),
        source_coverage: analyze_source_coverage(graph, clusters),
        physician_analysis: analyze_canonical_physicians(physicians),
    };
    info!("Generated cluster report for {} clusters", clusters.len());
    Report::Ready(report)
}
