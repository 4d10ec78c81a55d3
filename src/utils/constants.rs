// src/utils/constants.rs

/// Mean Earth radius used by the haversine distance, in miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Overall score assigned to a pair whose NPIs agree. Kept below 1.0 so that
/// averaged edge weights still distinguish NPI links from perfect ones.
pub const NPI_MATCH_SCORE: f64 = 0.95;

/// Overall-score weights when no NPI decision is available.
pub const NAME_WEIGHT: f64 = 0.50;
pub const LOCATION_WEIGHT: f64 = 0.30;
pub const SPECIALTY_WEIGHT: f64 = 0.20;

/// Name similarity = last * LAST_NAME_WEIGHT + first * FIRST_NAME_WEIGHT.
pub const LAST_NAME_WEIGHT: f64 = 0.6;
pub const FIRST_NAME_WEIGHT: f64 = 0.4;

/// Step 1 of pruning drops edges below `min_edge_weight * LOW_CONFIDENCE_FACTOR`.
pub const LOW_CONFIDENCE_FACTOR: f64 = 0.75;

/// Safety valve for the oversized-cluster splitting loop.
pub const DEFAULT_MAX_SPLIT_ITERATIONS: usize = 1000;

/// Cluster sizes that trigger overmatching notices.
pub const LARGE_CLUSTER_NOTICE_SIZE: usize = 20;
pub const LARGE_CLUSTER_WARNING_SIZE: usize = 50;

/// More distinct states than this is reported as geographic spread.
pub const MAX_EXPECTED_STATES: usize = 3;

/// Quality score forced onto clusters that still hold conflicting NPIs.
pub const CONFLICT_QUALITY_SCORE: f64 = 0.1;

/// Prefix used for pruning anomalies copied into cluster warnings.
pub const ANOMALY_PREFIX: &str = "ANOMALY:";
