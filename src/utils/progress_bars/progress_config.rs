// src/utils/progress_bars/progress_config.rs

use indicatif::MultiProgress;
use std::env;

/// Reads a boolean env var; unset or unparseable values yield `default`.
fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Terminal feedback for a resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Master switch for bars and memory reporting.
    pub enabled: bool,
    /// Per-stage bars (scoring, graph build, pruning). Off leaves only log lines.
    pub detailed: bool,
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// PROGRESS_ENABLED, PROGRESS_DETAILED and PROGRESS_SHOW_MEMORY, all defaulting to true.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("PROGRESS_ENABLED", defaults.enabled),
            detailed: env_flag("PROGRESS_DETAILED", defaults.detailed),
            show_memory: env_flag("PROGRESS_SHOW_MEMORY", defaults.show_memory),
        }
    }

    /// The shared bar container handed to each stage, or `None` when bars are off.
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        self.should_show_detailed().then(MultiProgress::new)
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_flags() {
        env::set_var("PROGRESS_DETAILED", " false ");
        env::set_var("PROGRESS_SHOW_MEMORY", "nope");
        let config = ProgressConfig::from_env();
        assert!(!config.detailed);
        assert!(config.show_memory);
        env::remove_var("PROGRESS_DETAILED");
        env::remove_var("PROGRESS_SHOW_MEMORY");
    }

    #[test]
    fn test_bars_need_both_switches() {
        let mut config = ProgressConfig::default();
        assert!(config.create_multi_progress().is_some());

        config.detailed = false;
        assert!(config.create_multi_progress().is_none());
        assert!(config.should_show_memory());

        config.enabled = false;
        config.detailed = true;
        assert!(config.create_multi_progress().is_none());
        assert!(!config.should_show_memory());
    }
}
