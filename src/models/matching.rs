// src/models/matching.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of comparing the NPIs of two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpiComparison {
    /// Both well-formed and equal.
    Match,
    /// Both well-formed and different.
    Conflict,
    /// At least one side missing or malformed.
    Unknown,
}

/// Multi-factor similarity breakdown for a record pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScores {
    pub npi_match: NpiComparison,
    pub name_similarity: f64,
    /// `None` when either specialty is absent.
    pub specialty_match: Option<f64>,
    pub location_score: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    Match,
    NonMatch,
    Uncertain,
}

impl fmt::Display for MatchDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchDecision::Match => "match",
            MatchDecision::NonMatch => "non_match",
            MatchDecision::Uncertain => "uncertain",
        })
    }
}

/// Audit label describing which signals drove a decision. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    NpiExact,
    NameLocationStrong,
    NameSpecialty,
    NameStrong,
    NameLocation,
    NameModerate,
    Weak,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::NpiExact => "npi_exact",
            MatchType::NameLocationStrong => "name_location_strong",
            MatchType::NameSpecialty => "name_specialty",
            MatchType::NameStrong => "name_strong",
            MatchType::NameLocation => "name_location",
            MatchType::NameModerate => "name_moderate",
            MatchType::Weak => "weak",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluated candidate pair. `source_id_1` is always the lexicographically smaller id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub source_id_1: String,
    pub source_id_2: String,
    pub scores: SimilarityScores,
    pub decision: MatchDecision,
    pub confidence: f64,
    pub match_type: MatchType,
}

/// A match accepted into the identity graph, weighted by the pair's overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedMatch {
    pub source_id_1: String,
    pub source_id_2: String,
    pub weight: f64,
}

impl ConfirmedMatch {
    pub fn new(source_id_1: impl Into<String>, source_id_2: impl Into<String>, weight: f64) -> Self {
        Self {
            source_id_1: source_id_1.into(),
            source_id_2: source_id_2.into(),
            weight,
        }
    }
}
