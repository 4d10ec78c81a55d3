// src/clustering/quality.rs

use log::info;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::clustering::components::Cluster;
use crate::clustering::graph::{IdentityGraph, NodeId};
use crate::matching::similarity::canonical_specialty;
use crate::models::ClusterQuality;
use crate::utils::constants::CONFLICT_QUALITY_SCORE;

/// Internal edge statistics of one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeStats {
    pub edge_count: usize,
    /// 0.0 when the cluster has no internal edges.
    pub avg_weight: f64,
    /// 0.0 when the cluster has no internal edges.
    pub min_weight: f64,
    /// Edges present / edges possible; 1.0 for a singleton.
    pub density: f64,
}

pub fn edge_stats(graph: &IdentityGraph, members: &[NodeId]) -> EdgeStats {
    let weights: Vec<f64> = graph
        .edges_within(members)
        .into_iter()
        .map(|(_, e)| e.weight)
        .collect();
    let size = members.len();
    let possible = size * size.saturating_sub(1) / 2;

    let (avg_weight, min_weight) = if weights.is_empty() {
        (0.0, 0.0)
    } else {
        (
            weights.iter().sum::<f64>() / weights.len() as f64,
            weights.iter().copied().fold(f64::INFINITY, f64::min),
        )
    };
    let density = if possible > 0 {
        weights.len() as f64 / possible as f64
    } else {
        1.0
    };

    EdgeStats {
        edge_count: weights.len(),
        avg_weight,
        min_weight,
        density,
    }
}

/// Upper-cased distinct states of `members`.
pub fn distinct_states(graph: &IdentityGraph, members: &[NodeId]) -> BTreeSet<String> {
    members
        .iter()
        .filter_map(|&m| graph.node(m).state.as_deref())
        .map(str::to_uppercase)
        .collect()
}

/// Distinct specialties after synonym folding, so "IM" and "Internal Medicine" count once.
pub fn distinct_specialties(graph: &IdentityGraph, members: &[NodeId]) -> BTreeSet<String> {
    members
        .iter()
        .filter_map(|&m| graph.node(m).specialty.as_deref())
        .map(canonical_specialty)
        .collect()
}

fn quality_score(
    size: usize,
    stats: &EdgeStats,
    npi_conflict: bool,
    state_count: usize,
    specialty_count: usize,
) -> f64 {
    if npi_conflict {
        return CONFLICT_QUALITY_SCORE;
    }

    let mut score = 1.0;
    score *= stats.avg_weight * 0.4 + stats.min_weight * 0.2 + 0.4;

    if size <= 5 {
        score *= stats.density * 0.3 + 0.7;
    }
    if state_count > 1 {
        score *= (1.0 - (state_count - 1) as f64 * 0.15).max(0.5);
    }
    if specialty_count > 2 {
        score *= (1.0 - (specialty_count - 2) as f64 * 0.10).max(0.5);
    }
    if size > 10 {
        score *= (1.0 - (size - 10) as f64 * 0.02).max(0.5);
    }

    score.clamp(0.0, 1.0)
}

/// Scores how much `cluster` looks like a single physician.
pub fn assess_cluster_quality(graph: &IdentityGraph, cluster: &Cluster) -> ClusterQuality {
    let members = cluster.members();
    let size = members.len();
    let stats = edge_stats(graph, members);

    let npis = graph.distinct_npis(members);
    let npi_conflict = npis.len() > 1;
    let states = distinct_states(graph, members);
    let specialties = distinct_specialties(graph, members);

    // NPI, state spread and size warnings come from `detect_overmatching`
    let mut warnings = Vec::new();
    if specialties.len() > 3 {
        warnings.push(format!("Multiple specialties: {} found", specialties.len()));
    }

    ClusterQuality {
        size,
        avg_edge_weight: stats.avg_weight,
        min_edge_weight: stats.min_weight,
        density: stats.density,
        npi_count: npis.len(),
        npi_conflict,
        state_count: states.len(),
        specialty_count: specialties.len(),
        quality_score: quality_score(size, &stats, npi_conflict, states.len(), specialties.len()),
        warnings,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub total_clusters: usize,
    pub avg_quality_score: f64,
    pub min_quality_score: f64,
    pub max_quality_score: f64,
    pub npi_conflict_count: usize,
    pub clusters_with_warnings: usize,
    pub high_quality_count: usize,
    pub medium_quality_count: usize,
    pub low_quality_count: usize,
}

/// `None` when there are no clusters to summarise.
pub fn quality_summary(qualities: &[ClusterQuality]) -> Option<QualitySummary> {
    if qualities.is_empty() {
        return None;
    }
    let scores: Vec<f64> = qualities.iter().map(|q| q.quality_score).collect();
    Some(QualitySummary {
        total_clusters: qualities.len(),
        avg_quality_score: scores.iter().sum::<f64>() / scores.len() as f64,
        min_quality_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
        max_quality_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        npi_conflict_count: qualities.iter().filter(|q| q.npi_conflict).count(),
        clusters_with_warnings: qualities.iter().filter(|q| !q.warnings.is_empty()).count(),
        high_quality_count: scores.iter().filter(|&&s| s >= 0.8).count(),
        medium_quality_count: scores.iter().filter(|&&s| (0.5..0.8).contains(&s)).count(),
        low_quality_count: scores.iter().filter(|&&s| s < 0.5).count(),
    })
}

pub fn log_quality_statistics(qualities: &[ClusterQuality]) {
    match quality_summary(qualities) {
        None => info!("No clusters to assess"),
        Some(summary) => {
            info!(
                "Cluster quality: avg {:.3} (min {:.3}, max {:.3}) over {} clusters",
                summary.avg_quality_score,
                summary.min_quality_score,
                summary.max_quality_score,
                summary.total_clusters
            );
            info!(
                "   • High: {}, medium: {}, low: {}",
                summary.high_quality_count,
                summary.medium_quality_count,
                summary.low_quality_count
            );
            info!(
                "   • {} with warnings, {} with NPI conflicts",
                summary.clusters_with_warnings, summary.npi_conflict_count
            );
        }
    }
}
