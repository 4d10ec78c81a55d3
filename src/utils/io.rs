// src/utils/io.rs - JSON input and run artifacts

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::canonicalization::CanonicalIdStats;
use crate::clustering::export::GraphStats;
use crate::clustering::pruning::PruningReport;
use crate::matching::manager::MatchingSummary;
use crate::models::NormalizedRecord;
use crate::pipeline::ResolutionOutput;
use crate::utils::config::PipelineConfig;

/// Reads a JSON array of normalized records.
pub fn read_records(path: &Path) -> Result<Vec<NormalizedRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    let records: Vec<NormalizedRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse records from {}", path.display()))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

pub fn write_json<T: Serialize + ?Sized>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: NaiveDateTime,
    pub elapsed_seconds: f64,
    pub input_records: usize,
    pub config: PipelineConfig,
    pub matching: MatchingSummary,
    pub confirmed_matches: usize,
    pub pruning: PruningReport,
    pub initial_graph: GraphStats,
    pub final_graph: GraphStats,
    pub total_clusters: usize,
    pub canonical_ids: CanonicalIdStats,
    pub phase_times: BTreeMap<String, f64>,
}

impl RunSummary {
    pub fn new(
        run_id: &str,
        started_at: NaiveDateTime,
        elapsed_seconds: f64,
        input_records: usize,
        config: &PipelineConfig,
        output: &ResolutionOutput,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            elapsed_seconds,
            input_records,
            config: config.clone(),
            matching: output.matching_summary.clone(),
            confirmed_matches: output.confirmed_matches,
            pruning: output.pruning_report.clone(),
            initial_graph: output.initial_graph_stats.clone(),
            final_graph: output.final_graph_stats.clone(),
            total_clusters: output.clusters.len(),
            canonical_ids: output.canonical_id_stats.clone(),
            phase_times: output.phase_times.clone(),
        }
    }
}

/// Writes every run artifact into `dir`, creating it if needed.
pub fn write_artifacts(
    dir: &Path,
    output: &ResolutionOutput,
    summary: &RunSummary,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let reports = serde_json::json!({
        "match_quality": &output.match_quality_report,
        "clusters": &output.cluster_report,
    });
    let clusters: Vec<serde_json::Value> = output
        .clusters
        .iter()
        .map(|c| serde_json::json!({ "canonical_id": &c.canonical_id, "source_ids": &c.source_ids }))
        .collect();
    let qualities: Vec<serde_json::Value> = output
        .clusters
        .iter()
        .map(|c| serde_json::json!({ "canonical_id": &c.canonical_id, "quality": &c.quality }))
        .collect();

    let written = vec![
        write_json(dir, "match_results.json", &output.match_results)?,
        write_json(dir, "clusters.json", &clusters)?,
        write_json(dir, "canonical_mapping.json", &output.canonical_mapping)?,
        write_json(dir, "canonical_physicians.json", &output.canonical_physicians)?,
        write_json(dir, "record_confidences.json", &output.record_confidences)?,
        write_json(dir, "cluster_quality.json", &qualities)?,
        write_json(dir, "reports.json", &reports)?,
        write_json(dir, "run_summary.json", summary)?,
    ];
    info!("Wrote {} artifacts to {}", written.len(), dir.display());
    Ok(written)
}
