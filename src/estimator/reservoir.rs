use super::{Estimate, Estimator, EstimatorError};
use crate::source::status::extract_status_code;
use crate::source::Batch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Uniform random sample of fixed capacity over an unbounded stream (Algorithm R).
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T, R = StdRng> {
    capacity: usize,
    sample: Vec<T>,
    count: u64,
    rng: R,
}

impl<T> ReservoirSampler<T, StdRng> {
    pub fn new(capacity: usize) -> Result<Self, EstimatorError> {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self, EstimatorError> {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }
}

impl<T, R: Rng> ReservoirSampler<T, R> {
    pub fn with_rng(capacity: usize, rng: R) -> Result<Self, EstimatorError> {
        if capacity == 0 {
            return Err(EstimatorError::InvalidReservoirSize);
        }

        Ok(Self {
            capacity,
            sample: Vec::with_capacity(capacity),
            count: 0,
            rng,
        })
    }

    /// Offer one item to the sample.
    ///
    /// Until the sample is full every item is kept. Afterwards an index is drawn
    /// uniformly from `[0, count)` and the item replaces that slot when the index
    /// falls inside the sample.
    pub fn add(&mut self, item: T) {
        if self.count < self.capacity as u64 {
            self.sample.push(item);
        } else {
            let j = self.rng.random_range(0..self.count);
            if j < self.capacity as u64 {
                self.sample[j as usize] = item;
            }
        }
        self.count += 1;
    }

    pub fn sample(&self) -> &[T] {
        &self.sample
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items offered so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.sample.is_empty()
    }
}

impl<T: PartialEq, R> ReservoirSampler<T, R> {
    /// Most frequent item in the sample; ties go to the item seen first in sample order.
    pub fn mode(&self) -> Option<&T> {
        let mut counts: Vec<(&T, usize)> = Vec::new();
        for item in &self.sample {
            match counts.iter_mut().find(|(seen, _)| *seen == item) {
                Some((_, n)) => *n += 1,
                None => counts.push((item, 1)),
            }
        }

        let mut best: Option<(&T, usize)> = None;
        for (item, n) in counts {
            if best.map_or(true, |(_, best_n)| n > best_n) {
                best = Some((item, n));
            }
        }
        best.map(|(item, _)| item)
    }
}

/// Mode of a uniform sample of the status codes seen so far.
///
/// Time bounds are running bounds over every event, whether or not its status
/// code could be extracted.
#[derive(Debug)]
pub struct ReservoirEstimator {
    sampler: ReservoirSampler<u64>,
    newest: Option<f64>,
    oldest: Option<f64>,
}

impl ReservoirEstimator {
    pub fn new(reservoir_size: usize) -> Result<Self, EstimatorError> {
        Ok(Self::from_sampler(ReservoirSampler::new(reservoir_size)?))
    }

    pub fn with_seed(reservoir_size: usize, seed: u64) -> Result<Self, EstimatorError> {
        Ok(Self::from_sampler(ReservoirSampler::with_seed(
            reservoir_size,
            seed,
        )?))
    }

    fn from_sampler(sampler: ReservoirSampler<u64>) -> Self {
        Self {
            sampler,
            newest: None,
            oldest: None,
        }
    }

    pub fn sampler(&self) -> &ReservoirSampler<u64> {
        &self.sampler
    }

    /// Fold a batch into the sample without producing an estimate
    pub fn fold(&mut self, batch: &Batch) {
        for event in &batch.events {
            if let Some(code) = extract_status_code(&event.message) {
                self.sampler.add(code);
            }
            self.newest = Some(self.newest.map_or(event.timestamp, |n| n.max(event.timestamp)));
            self.oldest = Some(self.oldest.map_or(event.timestamp, |o| o.min(event.timestamp)));
        }
    }

    /// Estimate from the current sample, `None` while it is empty
    pub fn current(&self) -> Option<Estimate> {
        let mode = *self.sampler.mode()?;
        Some(Estimate::new(mode as f64, self.newest?, self.oldest?))
    }
}

impl Estimator for ReservoirEstimator {
    fn name(&self) -> &'static str {
        "reservoir"
    }

    fn consume(&mut self, batch: &Batch) -> Option<Estimate> {
        self.fold(batch);
        self.current()
    }
}

/// Reservoir state shared between the folding worker and the pulling side.
///
/// Both the sample and the bounds live behind one lock. `ready` is signalled
/// after every fold so a puller waiting on an empty sample wakes up.
#[derive(Debug)]
pub struct SharedReservoir {
    state: Mutex<ReservoirEstimator>,
    ready: Notify,
}

impl SharedReservoir {
    pub fn new(estimator: ReservoirEstimator) -> Self {
        Self {
            state: Mutex::new(estimator),
            ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReservoirEstimator> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fold(&self, batch: &Batch) {
        {
            let mut state = self.lock();
            state.fold(batch);
            debug!(
                batch_id = %batch.id,
                sampled = state.sampler().sample().len(),
                seen = state.sampler().count(),
                "Reservoir updated"
            );
        }
        self.ready.notify_one();
    }

    pub fn current(&self) -> Option<Estimate> {
        self.lock().current()
    }

    /// Wait until the next fold, or give up after `timeout`
    pub async fn wait_for_update(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.ready.notified()).await;
    }
}
