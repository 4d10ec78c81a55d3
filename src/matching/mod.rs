pub mod blocking;
pub mod classifier;
pub mod manager;
pub mod similarity;

pub use blocking::{candidate_pairs, soundex, CandidatePair};
pub use classifier::{classify, determine_match_type};
pub use manager::{find_matches, get_confirmed_matches, MatchingSummary};
pub use similarity::score;
