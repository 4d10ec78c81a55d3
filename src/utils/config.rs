// src/utils/config.rs

use anyhow::{bail, Result};
use log::{debug, info};
use serde::Serialize;
use std::env;

use crate::utils::constants::DEFAULT_MAX_SPLIT_ITERATIONS;

/// Thresholds and switches for one resolution run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Overall score at or above which a pair is a match.
    pub match_threshold: f64,
    /// Overall score at or below which a pair is a non-match.
    pub non_match_threshold: f64,
    /// Bridges lighter than this are cut; step 1 of pruning uses 75% of it.
    pub min_edge_weight: f64,
    pub max_cluster_size: usize,
    pub prune_npi_conflicts: bool,
    pub use_phonetic_blocking: bool,
    pub include_uncertain_matches: bool,
    pub max_split_iterations: usize,
    /// Bridges lighter than this are reported by overmatching detection.
    pub weak_bridge_threshold: f64,
    /// Threads used for pair scoring.
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
            non_match_threshold: 0.30,
            min_edge_weight: 0.40,
            max_cluster_size: 100,
            prune_npi_conflicts: true,
            use_phonetic_blocking: true,
            include_uncertain_matches: false,
            max_split_iterations: DEFAULT_MAX_SPLIT_ITERATIONS,
            weak_bridge_threshold: 0.5,
            worker_threads: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            match_threshold: env::var("MATCH_THRESHOLD")
                .unwrap_or_else(|_| defaults.match_threshold.to_string())
                .parse()
                .unwrap_or(defaults.match_threshold),
            non_match_threshold: env::var("NON_MATCH_THRESHOLD")
                .unwrap_or_else(|_| defaults.non_match_threshold.to_string())
                .parse()
                .unwrap_or(defaults.non_match_threshold),
            min_edge_weight: env::var("MIN_EDGE_WEIGHT")
                .unwrap_or_else(|_| defaults.min_edge_weight.to_string())
                .parse()
                .unwrap_or(defaults.min_edge_weight),
            max_cluster_size: env::var("MAX_CLUSTER_SIZE")
                .unwrap_or_else(|_| defaults.max_cluster_size.to_string())
                .parse()
                .unwrap_or(defaults.max_cluster_size),
            prune_npi_conflicts: env::var("PRUNE_NPI_CONFLICTS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            use_phonetic_blocking: env::var("USE_PHONETIC_BLOCKING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            include_uncertain_matches: env::var("INCLUDE_UNCERTAIN_MATCHES")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            max_split_iterations: env::var("MAX_SPLIT_ITERATIONS")
                .unwrap_or_else(|_| defaults.max_split_iterations.to_string())
                .parse()
                .unwrap_or(defaults.max_split_iterations),
            weak_bridge_threshold: env::var("WEAK_BRIDGE_THRESHOLD")
                .unwrap_or_else(|_| defaults.weak_bridge_threshold.to_string())
                .parse()
                .unwrap_or(defaults.weak_bridge_threshold),
            worker_threads: env::var("MATCH_WORKER_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.worker_threads),
        };
        debug!("Pipeline config from env: {:?}", config);
        config
    }

    /// Reject threshold combinations that would make classification meaningless.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v > 0.0 && v < 1.0;
        if !in_unit(self.match_threshold) {
            bail!("match_threshold must be in (0, 1), got {}", self.match_threshold);
        }
        if !in_unit(self.non_match_threshold) {
            bail!(
                "non_match_threshold must be in (0, 1), got {}",
                self.non_match_threshold
            );
        }
        if self.non_match_threshold >= self.match_threshold {
            bail!(
                "non_match_threshold ({}) must be below match_threshold ({})",
                self.non_match_threshold,
                self.match_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.min_edge_weight) {
            bail!("min_edge_weight must be in [0, 1], got {}", self.min_edge_weight);
        }
        if !(0.0..=1.0).contains(&self.weak_bridge_threshold) {
            bail!(
                "weak_bridge_threshold must be in [0, 1], got {}",
                self.weak_bridge_threshold
            );
        }
        if self.max_cluster_size < 2 {
            bail!("max_cluster_size must be at least 2, got {}", self.max_cluster_size);
        }
        if self.worker_threads == 0 {
            bail!("worker_threads must be at least 1");
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("⚙️  Resolution configuration:");
        info!(
            "   • Thresholds: match ≥ {:.2}, non-match ≤ {:.2}",
            self.match_threshold, self.non_match_threshold
        );
        info!(
            "   • Pruning: min edge weight {:.2}, max cluster size {}, split cap {} iterations",
            self.min_edge_weight, self.max_cluster_size, self.max_split_iterations
        );
        info!(
            "   • NPI conflict pruning: {}",
            if self.prune_npi_conflicts { "enabled" } else { "disabled" }
        );
        info!(
            "   • Phonetic blocking: {}",
            if self.use_phonetic_blocking { "enabled" } else { "disabled" }
        );
        info!(
            "   • Uncertain pairs in graph: {}",
            if self.include_uncertain_matches { "included" } else { "excluded" }
        );
        info!("   • Scoring threads: {}", self.worker_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.match_threshold, 0.85);
        assert_eq!(config.non_match_threshold, 0.30);
        assert_eq!(config.min_edge_weight, 0.40);
        assert_eq!(config.max_cluster_size, 100);
        assert!(config.prune_npi_conflicts);
        assert!(config.use_phonetic_blocking);
        assert!(!config.include_uncertain_matches);
        assert_eq!(config.max_split_iterations, 1000);
        assert!(config.worker_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_config() {
        env::set_var("MATCH_THRESHOLD", "0.9");
        env::set_var("NON_MATCH_THRESHOLD", "0.2");
        env::set_var("MAX_CLUSTER_SIZE", "25");
        env::set_var("USE_PHONETIC_BLOCKING", "false");
        env::set_var("MATCH_WORKER_THREADS", "not-a-number");

        let config = PipelineConfig::from_env();
        assert_eq!(config.match_threshold, 0.9);
        assert_eq!(config.non_match_threshold, 0.2);
        assert_eq!(config.max_cluster_size, 25);
        assert!(!config.use_phonetic_blocking);
        assert_eq!(config.worker_threads, num_cpus::get());

        // Clean up
        env::remove_var("MATCH_THRESHOLD");
        env::remove_var("NON_MATCH_THRESHOLD");
        env::remove_var("MAX_CLUSTER_SIZE");
        env::remove_var("USE_PHONETIC_BLOCKING");
        env::remove_var("MATCH_WORKER_THREADS");
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = PipelineConfig {
            match_threshold: 0.3,
            non_match_threshold: 0.6,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be below"));
    }

    #[test]
    fn test_validate_rejects_degenerate_thresholds() {
        let zero_floor = PipelineConfig {
            non_match_threshold: 0.0,
            ..PipelineConfig::default()
        };
        assert!(zero_floor.validate().is_err());

        let unit_ceiling = PipelineConfig {
            match_threshold: 1.0,
            ..PipelineConfig::default()
        };
        assert!(unit_ceiling.validate().is_err());

        let tiny_clusters = PipelineConfig {
            max_cluster_size: 1,
            ..PipelineConfig::default()
        };
        assert!(tiny_clusters.validate().is_err());
    }
}
