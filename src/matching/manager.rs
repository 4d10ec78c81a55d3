// src/matching/manager.rs - Blocking, parallel scoring and classification
use anyhow::{Context, Result};
use indicatif::MultiProgress;
use rayon::prelude::*;
use serde::Serialize;

use crate::matching::blocking::{candidate_pairs, CandidatePair};
use crate::matching::classifier::{classify, determine_match_type};
use crate::matching::similarity::score;
use crate::models::{ConfirmedMatch, MatchDecision, MatchResult, NormalizedRecord};
use crate::utils::config::PipelineConfig;
use crate::utils::progress_bars::logging::{PipelineStage, StageLogger};
use crate::utils::progress_bars::stage_bar;

/// Decision counts for one matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchingSummary {
    pub candidate_pairs: usize,
    pub matches: usize,
    pub non_matches: usize,
    pub uncertain: usize,
}

impl MatchingSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut summary = Self {
            candidate_pairs: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.decision {
                MatchDecision::Match => summary.matches += 1,
                MatchDecision::NonMatch => summary.non_matches += 1,
                MatchDecision::Uncertain => summary.uncertain += 1,
            }
        }
        summary
    }
}

/// Scores and classifies one candidate pair.
pub fn evaluate_pair(pair: &CandidatePair<'_>, config: &PipelineConfig) -> MatchResult {
    let scores = score(pair.left, pair.right);
    let (decision, confidence) =
        classify(&scores, config.match_threshold, config.non_match_threshold);
    let match_type = determine_match_type(&scores);
    MatchResult {
        source_id_1: pair.left.source_id.clone(),
        source_id_2: pair.right.source_id.clone(),
        scores,
        decision,
        confidence,
        match_type,
    }
}

/// Runs blocking, then scores every candidate pair on a dedicated rayon pool.
/// Results are ordered by `(source_id_1, source_id_2)`.
pub fn find_matches(
    records: &[NormalizedRecord],
    config: &PipelineConfig,
    multi_progress: Option<MultiProgress>,
) -> Result<Vec<MatchResult>> {
    let blocking_logger = StageLogger::new(PipelineStage::Blocking);
    blocking_logger.log_start(&format!(
        "{} records, phonetic pass {}",
        records.len(),
        if config.use_phonetic_blocking { "on" } else { "off" }
    ));
    let pairs = candidate_pairs(records, config.use_phonetic_blocking);
    blocking_logger.log_completion(&format!("{} candidate pairs", pairs.len()));

    let scoring_logger = StageLogger::new(PipelineStage::Scoring);
    scoring_logger.log_start(&format!(
        "{} pairs on {} threads",
        pairs.len(),
        config.worker_threads
    ));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build()
        .context("Failed to build scoring thread pool")?;

    let pb = stage_bar(
        multi_progress.as_ref(),
        pairs.len() as u64,
        "Scoring candidate pairs...",
    );

    let mut results: Vec<MatchResult> = pool.install(|| {
        pairs
            .par_iter()
            .map(|pair| {
                let result = evaluate_pair(pair, config);
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                result
            })
            .collect()
    });
    // par_iter keeps input order, the sort only guards the contract
    results.sort_by(|a, b| {
        (a.source_id_1.as_str(), a.source_id_2.as_str())
            .cmp(&(b.source_id_1.as_str(), b.source_id_2.as_str()))
    });

    if let Some(pb) = &pb {
        pb.finish_with_message("Scoring complete");
    }

    let summary = MatchingSummary::from_results(&results);
    scoring_logger.log_completion(&format!(
        "{} matches, {} non-matches, {} uncertain",
        summary.matches, summary.non_matches, summary.uncertain
    ));

    Ok(results)
}

/// Matches (and optionally uncertain pairs) weighted by their overall score.
pub fn get_confirmed_matches(
    results: &[MatchResult],
    include_uncertain: bool,
) -> Vec<ConfirmedMatch> {
    let confirmed: Vec<ConfirmedMatch> = results
        .iter()
        .filter(|r| match r.decision {
            MatchDecision::Match => true,
            MatchDecision::Uncertain => include_uncertain,
            MatchDecision::NonMatch => false,
        })
        .map(|r| {
            ConfirmedMatch::new(
                r.source_id_1.clone(),
                r.source_id_2.clone(),
                r.scores.overall_score,
            )
        })
        .collect();
    log::info!("Extracted {} confirmed matches", confirmed.len());
    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NpiComparison, SourceType};

    fn config() -> PipelineConfig {
        PipelineConfig {
            worker_threads: 2,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_find_matches_orders_and_classifies() {
        let records = vec![
            NormalizedRecord::new(SourceType::License, "lic-2", "Smith")
                .with_first_name("John")
                .with_npi("1234567890"),
            NormalizedRecord::new(SourceType::Claims, "clm-1", "Smith")
                .with_first_name("John")
                .with_npi("1234567890"),
            NormalizedRecord::new(SourceType::Affiliation, "aff-9", "Nguyen")
                .with_first_name("Linh")
                .with_state("WA"),
        ];
        let results = find_matches(&records, &config(), None).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.source_id_1, "clm-1");
        assert_eq!(result.source_id_2, "lic-2");
        assert_eq!(result.scores.npi_match, NpiComparison::Match);
        assert_eq!(result.decision, MatchDecision::Match);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_find_matches_empty_input() {
        let results = find_matches(&[], &config(), None).unwrap();
        assert!(results.is_empty());
        assert_eq!(MatchingSummary::from_results(&results), MatchingSummary::default());
    }

    #[test]
    fn test_confirmed_matches_respect_uncertain_flag() {
        let records = vec![
            NormalizedRecord::new(SourceType::Claims, "a", "Smith").with_first_name("John").with_state("NY"),
            NormalizedRecord::new(SourceType::License, "b", "Smith").with_first_name("John").with_state("NY"),
            NormalizedRecord::new(SourceType::License, "c", "Smith").with_first_name("Mary").with_state("NY"),
        ];
        let results = find_matches(&records, &config(), None).unwrap();
        let summary = MatchingSummary::from_results(&results);
        assert_eq!(summary.candidate_pairs, 3);
        // John/John in the same state scores 0.79: uncertain under the default thresholds
        assert_eq!(summary.matches, 0);
        assert!(summary.uncertain >= 1);

        assert!(get_confirmed_matches(&results, false).is_empty());
        let with_uncertain = get_confirmed_matches(&results, true);
        assert_eq!(with_uncertain.len(), summary.uncertain);
        let ab = with_uncertain
            .iter()
            .find(|m| m.source_id_1 == "a" && m.source_id_2 == "b")
            .unwrap();
        assert!((ab.weight - 0.79).abs() < 1e-9);
    }
}
