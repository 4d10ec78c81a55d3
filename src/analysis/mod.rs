// src/analysis/mod.rs - Post-run reports over match results, clusters and entities

pub mod cluster_report;
pub mod match_quality;

use serde::Serialize;
use std::cmp::Ordering;

pub use cluster_report::{generate_cluster_report, ClusterReport};
pub use match_quality::{generate_match_quality_report, MatchQualityReport};

/// A report section that may have nothing to describe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report<T> {
    NoData { reason: String },
    Ready(T),
}

impl<T> Report<T> {
    pub fn no_data(reason: impl Into<String>) -> Self {
        Report::NoData {
            reason: reason.into(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Report::NoData { .. })
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Report::Ready(value) => Some(value),
            Report::NoData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Upper median: `sorted[len / 2]`.
    pub median: f64,
}

/// `None` for an empty slice.
pub fn score_stats(values: &[f64]) -> Option<ScoreStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    Some(ScoreStats {
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
        median: sorted[sorted.len() / 2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_stats() {
        assert_eq!(score_stats(&[]), None);
        let stats = score_stats(&[0.9, 0.1, 0.5, 0.3]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 0.1);
        assert_eq!(stats.max, 0.9);
        assert_eq!(stats.median, 0.5);
        assert!((stats.mean - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_no_data_serializes_with_status() {
        let report: Report<ScoreStats> = Report::no_data("No match results provided");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "no_data");
        assert_eq!(json["reason"], "No match results provided");
        assert!(report.ready().is_none());
    }
}
