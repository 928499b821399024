use super::{Estimate, Estimator};
use crate::source::status::is_success_message;
use crate::source::Batch;

/// Cumulative share of successful requests (status code starting with 2).
///
/// Counts are never reset. Every event counts toward the total; events without
/// a recognizable status code count as failures. Empty batches produce nothing.
#[derive(Debug, Default)]
pub struct BatchRateEstimator {
    total: u64,
    successes: u64,
    newest: Option<f64>,
    oldest: Option<f64>,
}

impl BatchRateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Current success ratio, 0.0 before any event was counted
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

impl Estimator for BatchRateEstimator {
    fn name(&self) -> &'static str {
        "batch_rate"
    }

    fn consume(&mut self, batch: &Batch) -> Option<Estimate> {
        let (batch_newest, batch_oldest) = (batch.newest()?, batch.oldest()?);

        for event in &batch.events {
            self.total += 1;
            if is_success_message(&event.message) {
                self.successes += 1;
            }
        }

        let newest = self.newest.map_or(batch_newest, |n| n.max(batch_newest));
        let oldest = self.oldest.map_or(batch_oldest, |o| o.min(batch_oldest));
        self.newest = Some(newest);
        self.oldest = Some(oldest);

        Some(Estimate::new(self.ratio(), newest, oldest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Event;

    fn batch(events: &[(f64, &str)]) -> Batch {
        Batch::new(
            "test.json",
            events
                .iter()
                .map(|(ts, msg)| Event::new("monitoring", *ts, *msg))
                .collect(),
        )
    }

    #[test]
    fn test_zero_before_any_event() {
        let estimator = BatchRateEstimator::new();
        assert_eq!(estimator.ratio(), 0.0);
        assert_eq!(estimator.total(), 0);
    }

    #[test]
    fn test_empty_batch_dropped() {
        let mut estimator = BatchRateEstimator::new();
        assert!(estimator.consume(&batch(&[])).is_none());
        assert_eq!(estimator.total(), 0);
    }

    #[test]
    fn test_cumulative_ratio() {
        let mut estimator = BatchRateEstimator::new();

        let first = estimator
            .consume(&batch(&[
                (148.0, "HTTP Status Code: 200"),
                (196.0, "HTTP Status Code: 500"),
            ]))
            .unwrap();
        assert_eq!(first, Estimate::new(0.5, 196.0, 148.0));

        let second = estimator
            .consume(&batch(&[(244.0, "HTTP Status Code: 200")]))
            .unwrap();
        assert_eq!(second.value, 2.0 / 3.0);
        assert_eq!(second.newest_considered, 244.0);
        assert_eq!(second.oldest_considered, 148.0);
    }

    #[test]
    fn test_ratio_matches_counts_over_many_batches() {
        let mut estimator = BatchRateEstimator::new();
        let codes = [200, 201, 404, 500, 204, 302, 299, 503, 200];
        let mut expected_total = 0u64;
        let mut expected_successes = 0u64;

        for (i, chunk) in codes.chunks(2).enumerate() {
            let events: Vec<(f64, String)> = chunk
                .iter()
                .map(|code| (i as f64, format!("HTTP Status Code: {}", code)))
                .collect();
            let refs: Vec<(f64, &str)> = events.iter().map(|(t, m)| (*t, m.as_str())).collect();

            expected_total += chunk.len() as u64;
            expected_successes += chunk.iter().filter(|c| (200..300).contains(*c)).count() as u64;

            let estimate = estimator.consume(&batch(&refs)).unwrap();
            assert_eq!(
                estimate.value,
                expected_successes as f64 / expected_total as f64
            );
        }

        assert_eq!(estimator.total(), 9);
        assert_eq!(estimator.successes(), 5);
    }

    #[test]
    fn test_message_without_code_counts_as_failure() {
        let mut estimator = BatchRateEstimator::new();
        let estimate = estimator
            .consume(&batch(&[(1.0, "HTTP Status Code: 204"), (2.0, "timeout")]))
            .unwrap();
        assert_eq!(estimate.value, 0.5);
    }

    #[test]
    fn test_newest_never_decreases() {
        let mut estimator = BatchRateEstimator::new();
        estimator.consume(&batch(&[(100.0, "HTTP Status Code: 200")]));
        let late = estimator
            .consume(&batch(&[(50.0, "HTTP Status Code: 200")]))
            .unwrap();
        assert_eq!(late.newest_considered, 100.0);
        assert_eq!(late.oldest_considered, 50.0);
    }

    #[test]
    fn test_long_codes_classified_by_leading_digit() {
        let mut estimator = BatchRateEstimator::new();

        let estimate = estimator
            .consume(&batch(&[
                (1.0, "HTTP Status Code: 2000"),
                (2.0, "HTTP Status Code: 200000"),
            ]))
            .unwrap();

        assert_eq!(estimate.value, 1.0);
        assert_eq!(estimator.successes(), 2);
    }
}
