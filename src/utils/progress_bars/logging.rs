// src/utils/progress_bars/logging.rs - Stage-prefixed logging for the resolution run
use log::{info, warn};
use std::time::Instant;

/// The fixed stages of a resolution run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Blocking,
    Scoring,
    GraphBuild,
    Pruning,
    Clustering,
    Quality,
    Canonicalization,
}

impl PipelineStage {
    fn label(&self) -> (&'static str, &'static str) {
        match self {
            PipelineStage::Blocking => ("BLOCKING", "🧱"),
            PipelineStage::Scoring => ("SCORING", "🧮"),
            PipelineStage::GraphBuild => ("GRAPH", "🕸️"),
            PipelineStage::Pruning => ("PRUNING", "✂️"),
            PipelineStage::Clustering => ("CLUSTERING", "🔗"),
            PipelineStage::Quality => ("QUALITY", "🔎"),
            PipelineStage::Canonicalization => ("CANONICAL", "🪪"),
        }
    }
}

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (stage_name, stage_emoji) = stage.label();
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, details: &str) {
        info!(
            "[{}] {} 🚀 Starting: {}",
            self.stage_name, self.stage_emoji, details
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_completion(&self, summary: &str) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} ✅ Completed in {:.2?}: {}",
            self.stage_name, self.stage_emoji, duration, summary
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }
}

pub fn log_pipeline_start(run_id: &str, record_count: usize) {
    info!("🏁 Physician resolution run {} starting", run_id);
    info!("   📊 Input: {} normalized records", record_count);
}

pub fn log_pipeline_complete(run_id: &str, entity_count: usize, elapsed: std::time::Duration) {
    info!(
        "🎉 Resolution run {} completed in {:.2?}: {} canonical physicians",
        run_id, elapsed, entity_count
    );
}
