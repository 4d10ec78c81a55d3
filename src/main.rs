use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dedupe_lib::pipeline::run_resolution;
use dedupe_lib::utils::config::PipelineConfig;
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::get_memory_usage;
use dedupe_lib::utils::io::{read_records, write_artifacts, RunSummary};
use dedupe_lib::utils::progress_bars::logging::{log_pipeline_complete, log_pipeline_start};
use dedupe_lib::utils::progress_bars::progress_config::ProgressConfig;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Resolve physician records into canonical entities", long_about = None)]
struct Args {
    /// JSON array of normalized records
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for run artifacts
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Overrides MATCH_THRESHOLD
    #[arg(long)]
    match_threshold: Option<f64>,

    /// Overrides NON_MATCH_THRESHOLD
    #[arg(long)]
    non_match_threshold: Option<f64>,

    /// Overrides MIN_EDGE_WEIGHT
    #[arg(long)]
    min_edge_weight: Option<f64>,

    /// Overrides MAX_CLUSTER_SIZE
    #[arg(long)]
    max_cluster_size: Option<usize>,

    /// Overrides MATCH_WORKER_THREADS
    #[arg(long)]
    threads: Option<usize>,

    /// Skip the Soundex blocking pass
    #[arg(long)]
    no_phonetic: bool,

    /// Keep NPI-conflicting edges in the graph
    #[arg(long)]
    no_npi_pruning: bool,

    /// Add uncertain pairs to the identity graph
    #[arg(long)]
    include_uncertain: bool,
}

impl Args {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(v) = self.match_threshold {
            config.match_threshold = v;
        }
        if let Some(v) = self.non_match_threshold {
            config.non_match_threshold = v;
        }
        if let Some(v) = self.min_edge_weight {
            config.min_edge_weight = v;
        }
        if let Some(v) = self.max_cluster_size {
            config.max_cluster_size = v;
        }
        if let Some(v) = self.threads {
            config.worker_threads = v;
        }
        if self.no_phonetic {
            config.use_phonetic_blocking = false;
        }
        if self.no_npi_pruning {
            config.prune_npi_conflicts = false;
        }
        if self.include_uncertain {
            config.include_uncertain_matches = true;
        }
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("Starting physician resolution pipeline");
    load_env();

    let config = args.apply(PipelineConfig::from_env());
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();

    let run_id = Uuid::new_v4().to_string();
    let run_timestamp = Utc::now().naive_utc();
    let start = Instant::now();

    let records = read_records(&args.input)?;
    log_pipeline_start(&run_id, records.len());
    if records.is_empty() {
        warn!("Input contains no records; artifacts will be empty");
    }

    let output = run_resolution(&records, &config, multi_progress)
        .context("Resolution run failed")?;

    let elapsed = start.elapsed();
    let summary = RunSummary::new(
        &run_id,
        run_timestamp,
        elapsed.as_secs_f64(),
        records.len(),
        &config,
        &output,
    );
    write_artifacts(&args.output_dir, &output, &summary)?;

    info!("=== Resolution Summary ===");
    info!("Run ID: {}", run_id);
    info!("Input records: {}", records.len());
    info!(
        "Candidate pairs: {} ({} matches, {} uncertain)",
        output.matching_summary.candidate_pairs,
        output.matching_summary.matches,
        output.matching_summary.uncertain
    );
    info!(
        "Edges pruned: {} of {}",
        output.pruning_report.total_removed(),
        output.pruning_report.initial_edges
    );
    if !output.pruning_report.anomalies.is_empty() {
        warn!(
            "{} pruning anomalies were recorded on cluster quality reports",
            output.pruning_report.anomalies.len()
        );
    }
    info!("=== Timing Breakdown ===");
    for (phase, seconds) in &output.phase_times {
        info!("{}: {:.2}s", phase, seconds);
    }

    if progress_config.should_show_memory() {
        info!("Final memory usage: {} MB", get_memory_usage());
    }

    log_pipeline_complete(&run_id, output.canonical_physicians.len(), elapsed);
    Ok(())
}
