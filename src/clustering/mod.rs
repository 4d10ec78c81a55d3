pub mod components;
pub mod export;
pub mod graph;
pub mod overmatching;
pub mod pruning;
pub mod quality;

pub use components::{find_clusters, Cluster};
pub use graph::{build_identity_graph, EdgeKey, IdentityGraph, NodeId};
pub use pruning::{full_pruning_pipeline, PruningAnomaly, PruningReport};
pub use quality::assess_cluster_quality;
