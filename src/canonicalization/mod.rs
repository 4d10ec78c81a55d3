pub mod confidence;
pub mod ids;
pub mod merge;

pub use confidence::{entity_confidence, record_confidence, record_confidences};
pub use ids::{assign_canonical_ids, canonical_id_stats, CanonicalAssignment, CanonicalIdStats};
pub use merge::{merge_all_clusters, merge_cluster_attributes};
