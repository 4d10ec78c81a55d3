// src/analysis/match_quality.rs

use log::info;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::analysis::{score_stats, Report, ScoreStats};
use crate::matching::manager::MatchingSummary;
use crate::models::{MatchDecision, MatchResult, MatchType, NpiComparison};

const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;
const LOW_CONFIDENCE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionScoreStats {
    #[serde(rename = "match")]
    pub matched: Option<ScoreStats>,
    pub non_match: Option<ScoreStats>,
    pub uncertain: Option<ScoreStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceAnalysis {
    pub total_matches: usize,
    /// >= 0.9
    pub high: usize,
    /// 0.7 to 0.9
    pub medium: usize,
    /// < 0.7
    pub low: usize,
    pub stats: ScoreStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpiAnalysis {
    pub npi_exact_matches: usize,
    pub npi_conflicts: usize,
    pub npi_unavailable: usize,
    pub npi_match_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowConfidenceMatch {
    pub source_id_1: String,
    pub source_id_2: String,
    pub confidence: f64,
    pub overall_score: f64,
    pub name_similarity: f64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchQualityReport {
    pub decisions: MatchingSummary,
    pub match_rate: f64,
    /// Match type counts among pairs classified as matches.
    pub match_types: BTreeMap<String, usize>,
    pub score_stats: DecisionScoreStats,
    pub confidence_analysis: Report<ConfidenceAnalysis>,
    pub npi_analysis: NpiAnalysis,
    pub low_confidence_matches: Vec<LowConfidenceMatch>,
}

fn scores_for(results: &[MatchResult], decision: MatchDecision) -> Vec<f64> {
    results
        .iter()
        .filter(|r| r.decision == decision)
        .map(|r| r.scores.overall_score)
        .collect()
}

pub fn analyze_match_confidence(results: &[MatchResult]) -> Report<ConfidenceAnalysis> {
    let confidences: Vec<f64> = results
        .iter()
        .filter(|r| r.decision == MatchDecision::Match)
        .map(|r| r.confidence)
        .collect();
    let Some(stats) = score_stats(&confidences) else {
        return Report::no_data("No matches found");
    };
    Report::Ready(ConfidenceAnalysis {
        total_matches: confidences.len(),
        high: confidences.iter().filter(|&&c| c >= 0.9).count(),
        medium: confidences.iter().filter(|&&c| (0.7..0.9).contains(&c)).count(),
        low: confidences.iter().filter(|&&c| c < 0.7).count(),
        stats,
    })
}

pub fn analyze_npi_matches(results: &[MatchResult]) -> NpiAnalysis {
    let mut analysis = NpiAnalysis {
        npi_exact_matches: 0,
        npi_conflicts: 0,
        npi_unavailable: 0,
        npi_match_rate: 0.0,
    };
    for result in results {
        match result.scores.npi_match {
            NpiComparison::Match => analysis.npi_exact_matches += 1,
            NpiComparison::Conflict => analysis.npi_conflicts += 1,
            NpiComparison::Unknown => analysis.npi_unavailable += 1,
        }
    }
    if !results.is_empty() {
        analysis.npi_match_rate = analysis.npi_exact_matches as f64 / results.len() as f64;
    }
    analysis
}

/// Matches below 0.7 confidence, weakest first, for manual review.
pub fn low_confidence_matches(results: &[MatchResult]) -> Vec<LowConfidenceMatch> {
    let mut low: Vec<&MatchResult> = results
        .iter()
        .filter(|r| r.decision == MatchDecision::Match && r.confidence < LOW_CONFIDENCE_THRESHOLD)
        .collect();
    low.sort_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal));
    low.into_iter()
        .take(LOW_CONFIDENCE_LIMIT)
        .map(|r| LowConfidenceMatch {
            source_id_1: r.source_id_1.clone(),
            source_id_2: r.source_id_2.clone(),
            confidence: r.confidence,
            overall_score: r.scores.overall_score,
            name_similarity: r.scores.name_similarity,
            match_type: r.match_type,
        })
        .collect()
}

pub fn generate_match_quality_report(results: &[MatchResult]) -> Report<MatchQualityReport> {
    if results.is_empty() {
        return Report::no_data("No match results provided");
    }

    let decisions = MatchingSummary::from_results(results);
    let mut match_types: BTreeMap<String, usize> = BTreeMap::new();
    for result in results.iter().filter(|r| r.decision == MatchDecision::Match) {
        *match_types.entry(result.match_type.as_str().to_string()).or_insert(0) += 1;
    }

    let report = MatchQualityReport {
        match_rate: decisions.matches as f64 / results.len() as f64,
        decisions,
        match_types,
        score_stats: DecisionScoreStats {
            matched: score_stats(&scores_for(results, MatchDecision::Match)),
            non_match: score_stats(&scores_for(results, MatchDecision::NonMatch)),
            uncertain: score_stats(&scores_for(results, MatchDecision::Uncertain)),
        },
        confidence_analysis: analyze_match_confidence(results),
        npi_analysis: analyze_npi_matches(results),
        low_confidence_matches: low_confidence_matches(results),
    };

    info!("Generated match quality report for {} comparisons", results.len());
    Report::Ready(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SimilarityScores;

    fn result(id: &str, decision: MatchDecision, overall: f64, confidence: f64, npi: NpiComparison) -> MatchResult {
        MatchResult {
            source_id_1: format!("{}-a", id),
            source_id_2: format!("{}-b", id),
            scores: SimilarityScores {
                npi_match: npi,
                name_similarity: overall,
                specialty_match: None,
                location_score: 0.2,
                overall_score: overall,
            },
            decision,
            confidence,
            match_type: MatchType::NameModerate,
        }
    }

    #[test]
    fn test_empty_results_report_no_data() {
        let report = generate_match_quality_report(&[]);
        assert!(report.is_no_data());
        assert!(analyze_match_confidence(&[]).is_no_data());
        assert_eq!(analyze_npi_matches(&[]).npi_match_rate, 0.0);
    }

    #[test]
    fn test_report_counts() {
        let results = vec![
            result("1", MatchDecision::Match, 0.95, 0.95, NpiComparison::Match),
            result("2", MatchDecision::Match, 0.86, 0.3, NpiComparison::Unknown),
            result("3", MatchDecision::NonMatch, 0.0, 1.0, NpiComparison::Conflict),
            result("4", MatchDecision::Uncertain, 0.5, 0.4, NpiComparison::Unknown),
        ];
        let report = generate_match_quality_report(&results);
        let report = report.ready().unwrap();
        assert_eq!(report.decisions.matches, 2);
        assert_eq!(report.decisions.non_matches, 1);
        assert_eq!(report.match_rate, 0.5);
        assert_eq!(report.match_types["name_moderate"], 2);
        assert_eq!(report.score_stats.matched.as_ref().unwrap().count, 2);
        assert_eq!(report.npi_analysis.npi_exact_matches, 1);
        assert_eq!(report.npi_analysis.npi_conflicts, 1);
        assert_eq!(report.npi_analysis.npi_unavailable, 2);

        let confidence = report.confidence_analysis.ready().unwrap();
        assert_eq!((confidence.high, confidence.medium, confidence.low), (1, 0, 1));

        assert_eq!(report.low_confidence_matches.len(), 1);
        assert_eq!(report.low_confidence_matches[0].source_id_1, "2-a");
    }

    #[test]
    fn test_low_confidence_list_is_capped_and_sorted() {
        let results: Vec<MatchResult> = (0..30)
            .map(|i| {
                let c = 0.69 - i as f64 * 0.01;
                result(&i.to_string(), MatchDecision::Match, 0.9, c, NpiComparison::Unknown)
            })
            .collect();
        let low = low_confidence_matches(&results);
        assert_eq!(low.len(), 20);
        assert!(low.windows(2).all(|w| w[0].confidence <= w[1].confidence));
        assert_eq!(low[0].source_id_1, "29-a");
    }
}
