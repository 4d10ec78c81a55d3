// src/models/entities.rs

use serde::{Deserialize, Serialize};

/// Diagnostic snapshot of one cluster. Recomputed on demand, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQuality {
    pub size: usize,
    pub avg_edge_weight: f64,
    pub min_edge_weight: f64,
    /// Edges present / edges possible. 1.0 for singletons.
    pub density: f64,
    /// Distinct well-formed NPIs.
    pub npi_count: usize,
    pub npi_conflict: bool,
    pub state_count: usize,
    pub specialty_count: usize,
    pub quality_score: f64,
    pub warnings: Vec<String>,
}

impl ClusterQuality {
    pub fn has_issues(&self) -> bool {
        self.npi_conflict || !self.warnings.is_empty()
    }
}

/// The resolved entity produced for one final cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPhysician {
    /// `PHY_{npi}` or `PHY_{12 hex chars}`.
    pub canonical_id: String,
    pub confidence: f64,

    pub npi: Option<String>,
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub primary_facility: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    pub all_facilities: Vec<String>,
    pub source_records: Vec<String>,
    pub source_count: usize,
}
