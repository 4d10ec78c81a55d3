pub mod core;
pub mod entities;
pub mod matching;

pub use self::core::{well_formed_npi, NormalizedRecord, SourceType};
pub use entities::{CanonicalPhysician, ClusterQuality};
pub use matching::{
    ConfirmedMatch, MatchDecision, MatchResult, MatchType, NpiComparison, SimilarityScores,
};
