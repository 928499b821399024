use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Glob matched against file names in `path` (non-recursive)
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Pause between scans that found nothing new
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Batches buffered between the watcher and the estimator
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pattern: default_pattern(),
            poll_interval: default_poll_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_pattern() -> String {
    "*.json".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_channel_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    BatchRate,
    SlidingWindow {
        #[serde(default = "default_window_seconds")]
        window_seconds: f64,
        #[serde(default = "default_target_service")]
        target_service: String,
    },
    Reservoir {
        #[serde(default = "default_reservoir_size")]
        reservoir_size: usize,
    },
    Bloom {
        filter_file: PathBuf,
        #[serde(default = "default_bit_count")]
        bit_count: usize,
        #[serde(default = "default_hash_count")]
        hash_count: u32,
    },
}

impl EstimatorConfig {
    pub fn sliding_window() -> Self {
        Self::SlidingWindow {
            window_seconds: default_window_seconds(),
            target_service: default_target_service(),
        }
    }

    pub fn reservoir() -> Self {
        Self::Reservoir {
            reservoir_size: default_reservoir_size(),
        }
    }

    pub fn bloom(filter_file: impl Into<PathBuf>) -> Self {
        Self::Bloom {
            filter_file: filter_file.into(),
            bit_count: default_bit_count(),
            hash_count: default_hash_count(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::BatchRate => "batch_rate",
            Self::SlidingWindow { .. } => "sliding_window",
            Self::Reservoir { .. } => "reservoir",
            Self::Bloom { .. } => "bloom",
        }
    }
}

pub fn default_window_seconds() -> f64 {
    60.0
}

pub fn default_target_service() -> String {
    "monitoring".to_string()
}

pub fn default_reservoir_size() -> usize {
    10
}

pub fn default_bit_count() -> usize {
    1_000_000
}

pub fn default_hash_count() -> u32 {
    7
}
