pub mod batch_rate;
pub mod bloom;
pub mod reservoir;
pub mod sliding_window;

use crate::config::EstimatorConfig;
use crate::source::Batch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use batch_rate::BatchRateEstimator;
pub use bloom::{BloomEstimator, BloomFilter};
pub use reservoir::{ReservoirEstimator, ReservoirSampler, SharedReservoir};
pub use sliding_window::SlidingWindowEstimator;

/// Errors raised while constructing an estimator
#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("reservoir size must be greater than zero")]
    InvalidReservoirSize,

    #[error("bloom filter needs a positive bit count and hash count (got m={bit_count}, k={hash_count})")]
    InvalidBloomParameters { bit_count: usize, hash_count: u32 },

    #[error("failed to read pattern file '{path}': {source}")]
    PatternFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A statistic together with the time span of the events behind it.
///
/// Timestamps are unix seconds, as found in the events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub newest_considered: f64,
    pub oldest_considered: f64,
}

impl Estimate {
    pub fn new(value: f64, newest_considered: f64, oldest_considered: f64) -> Self {
        Self {
            value,
            newest_considered,
            oldest_considered,
        }
    }

    pub fn newest_datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.newest_considered)
    }

    pub fn oldest_datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.oldest_considered)
    }
}

/// Convert unix seconds to a UTC datetime, rounding to the microsecond
fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
}

/// A stateful algorithm folding batches into a running statistic.
///
/// `consume` returns `None` when the batch did not produce anything worth
/// reporting (for example an empty batch).
pub trait Estimator: Send {
    fn name(&self) -> &'static str;

    fn consume(&mut self, batch: &Batch) -> Option<Estimate>;
}

/// An estimator built from configuration, tagged with how it must be driven.
pub enum EstimatorKind {
    /// Folded on the pulling task, one batch per pull
    Inline(Box<dyn Estimator>),
    /// Folded by a background worker while the caller pulls the current mode
    Sampled(ReservoirEstimator),
}

impl EstimatorKind {
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, EstimatorError> {
        let kind = match config {
            EstimatorConfig::BatchRate => Self::Inline(Box::new(BatchRateEstimator::new())),
            EstimatorConfig::SlidingWindow {
                window_seconds,
                target_service,
            } => Self::Inline(Box::new(SlidingWindowEstimator::new(
                *window_seconds,
                target_service.clone(),
            ))),
            EstimatorConfig::Reservoir { reservoir_size } => {
                Self::Sampled(ReservoirEstimator::new(*reservoir_size)?)
            }
            EstimatorConfig::Bloom {
                filter_file,
                bit_count,
                hash_count,
            } => Self::Inline(Box::new(BloomEstimator::from_pattern_file(
                filter_file,
                *bit_count,
                *hash_count,
            )?)),
        };
        Ok(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inline(estimator) => estimator.name(),
            Self::Sampled(estimator) => estimator.name(),
        }
    }
}

impl std::fmt::Debug for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(estimator) => f.debug_tuple("Inline").field(&estimator.name()).finish(),
            Self::Sampled(estimator) => f.debug_tuple("Sampled").field(estimator).finish(),
        }
    }
}
