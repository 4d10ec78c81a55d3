// src/matching/classifier.rs

use crate::models::{MatchDecision, MatchType, NpiComparison, SimilarityScores};

/// Three-way decision with a confidence in [0, 1].
///
/// NPI agreement and NPI conflict override every threshold. Thresholds are
/// expected to satisfy `0 < non_match_threshold < match_threshold < 1`
/// (see `PipelineConfig::validate`); degenerate values are still handled
/// without dividing by zero.
pub fn classify(
    scores: &SimilarityScores,
    match_threshold: f64,
    non_match_threshold: f64,
) -> (MatchDecision, f64) {
    match scores.npi_match {
        NpiComparison::Conflict => return (MatchDecision::NonMatch, 1.0),
        NpiComparison::Match => return (MatchDecision::Match, 0.95),
        NpiComparison::Unknown => {}
    }

    let overall = scores.overall_score;

    if overall >= match_threshold {
        let span = 1.0 - match_threshold;
        let lift = if span > 0.0 {
            (overall - match_threshold) / span
        } else {
            1.0
        };
        return (MatchDecision::Match, (0.7 + lift).min(0.95));
    }

    if overall <= non_match_threshold {
        let lift = if non_match_threshold > 0.0 {
            (non_match_threshold - overall) / non_match_threshold
        } else {
            1.0
        };
        return (MatchDecision::NonMatch, (0.7 + lift).min(0.95));
    }

    // Less confident the closer the score sits to the middle of the band
    let mid = (match_threshold + non_match_threshold) / 2.0;
    let confidence = 0.3 + 0.4 * (overall - mid).abs();
    (MatchDecision::Uncertain, confidence.clamp(0.0, 1.0))
}

/// Audit label describing which signals carried the pair.
pub fn determine_match_type(scores: &SimilarityScores) -> MatchType {
    if scores.npi_match == NpiComparison::Match {
        return MatchType::NpiExact;
    }

    if scores.name_similarity >= 0.9 {
        return if scores.location_score >= 0.7 {
            MatchType::NameLocationStrong
        } else if scores.specialty_match.map_or(false, |s| s >= 0.9) {
            MatchType::NameSpecialty
        } else {
            MatchType::NameStrong
        };
    }

    if scores.name_similarity >= 0.7 {
        return if scores.location_score >= 0.7 {
            MatchType::NameLocation
        } else {
            MatchType::NameModerate
        };
    }

    MatchType::Weak
}
