use super::{Estimate, Estimator};
use crate::source::status::{extract_status_code, CANONICAL_SUCCESS};
use crate::source::{Batch, Event};
use std::collections::HashMap;
use tracing::debug;

/// Failure count for one service over a trailing time window.
///
/// The window is right-aligned on the newest timestamp seen across all
/// services, not tracked per service. An estimate is produced only when a
/// batch moves that newest timestamp forward.
#[derive(Debug)]
pub struct SlidingWindowEstimator {
    window_seconds: f64,
    target_service: String,
    failures: HashMap<String, Vec<(f64, Event)>>,
    newest: f64,
}

impl SlidingWindowEstimator {
    pub fn new(window_seconds: f64, target_service: impl Into<String>) -> Self {
        Self {
            window_seconds,
            target_service: target_service.into(),
            failures: HashMap::new(),
            newest: 0.0,
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn target_service(&self) -> &str {
        &self.target_service
    }

    /// Failures currently retained for a service, in arrival order
    pub fn retained_failures(&self, service: &str) -> &[(f64, Event)] {
        self.failures
            .get(service)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Services with at least one retained failure
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.failures.keys().map(String::as_str)
    }

    fn is_failure(event: &Event) -> bool {
        extract_status_code(&event.message) != Some(CANONICAL_SUCCESS)
    }

    fn prune(&mut self, window_start: f64) {
        self.failures.retain(|_, entries| {
            entries.retain(|(ts, _)| *ts >= window_start);
            !entries.is_empty()
        });
    }
}

impl Estimator for SlidingWindowEstimator {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn consume(&mut self, batch: &Batch) -> Option<Estimate> {
        let mut advanced = false;

        for event in &batch.events {
            if event.timestamp > self.newest {
                self.newest = event.timestamp;
                advanced = true;
            }

            if !event.service.is_empty() && Self::is_failure(event) {
                self.failures
                    .entry(event.service.clone())
                    .or_default()
                    .push((event.timestamp, event.clone()));
            }
        }

        if !advanced {
            return None;
        }

        let window_start = self.newest - self.window_seconds;
        self.prune(window_start);

        let count = self.retained_failures(&self.target_service).len();
        debug!(
            target_service = %self.target_service,
            failures = count,
            window_start,
            window_end = self.newest,
            "Window advanced"
        );

        Some(Estimate::new(count as f64, self.newest, window_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 1_700_000_000.0;

    fn batch(events: &[(&str, f64, &str)]) -> Batch {
        Batch::new(
            "test.json",
            events
                .iter()
                .map(|(service, ts, msg)| Event::new(*service, *ts, *msg))
                .collect(),
        )
    }

    fn assert_window_invariant(estimator: &SlidingWindowEstimator, estimate: &Estimate) {
        let services: Vec<String> = estimator.services().map(str::to_string).collect();
        for service in services {
            for (ts, _) in estimator.retained_failures(&service) {
                assert!(
                    estimate.oldest_considered <= *ts && *ts <= estimate.newest_considered,
                    "{} outside [{}, {}]",
                    ts,
                    estimate.oldest_considered,
                    estimate.newest_considered
                );
            }
        }
    }

    #[test]
    fn test_window_slides() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");

        let first = estimator
            .consume(&batch(&[
                ("monitoring", T + 30.0, "HTTP Status Code: 200"),
                ("monitoring", T + 90.0, "HTTP Status Code: 500"),
            ]))
            .unwrap();
        assert_eq!(first, Estimate::new(1.0, T + 90.0, T + 30.0));

        let second = estimator
            .consume(&batch(&[("monitoring", T + 100.0, "HTTP Status Code: 503")]))
            .unwrap();
        assert_eq!(second, Estimate::new(2.0, T + 100.0, T + 40.0));

        let third = estimator
            .consume(&batch(&[("monitoring", T + 155.0, "HTTP Status Code: 500")]))
            .unwrap();
        assert_eq!(third, Estimate::new(2.0, T + 155.0, T + 95.0));

        let kept: Vec<f64> = estimator
            .retained_failures("monitoring")
            .iter()
            .map(|(ts, _)| *ts)
            .collect();
        assert_eq!(kept, vec![T + 100.0, T + 155.0]);
    }

    #[test]
    fn test_no_estimate_without_advance() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");
        estimator.consume(&batch(&[("monitoring", T + 90.0, "HTTP Status Code: 500")]));

        let late = estimator.consume(&batch(&[("monitoring", T + 80.0, "HTTP Status Code: 500")]));
        assert!(late.is_none());

        let empty = estimator.consume(&batch(&[]));
        assert!(empty.is_none());
    }

    #[test]
    fn test_other_services_counted_separately() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");

        let estimate = estimator
            .consume(&batch(&[
                ("training", T + 10.0, "HTTP Status Code: 500"),
                ("training", T + 11.0, "HTTP Status Code: 404"),
                ("monitoring", T + 12.0, "HTTP Status Code: 200"),
            ]))
            .unwrap();

        assert_eq!(estimate.value, 0.0);
        assert_eq!(estimator.retained_failures("training").len(), 2);
    }

    #[test]
    fn test_non_canonical_codes_are_failures() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");

        let estimate = estimator
            .consume(&batch(&[
                ("monitoring", T + 1.0, "HTTP Status Code: 201"),
                ("monitoring", T + 2.0, "connection reset"),
                ("monitoring", T + 3.0, "HTTP Status Code: 200"),
            ]))
            .unwrap();

        assert_eq!(estimate.value, 2.0);
    }

    #[test]
    fn test_window_applies_across_services() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");

        estimator.consume(&batch(&[("monitoring", T + 10.0, "HTTP Status Code: 500")]));
        let estimate = estimator
            .consume(&batch(&[("training", T + 200.0, "HTTP Status Code: 200")]))
            .unwrap();

        assert_eq!(estimate.value, 0.0);
        assert_eq!(estimator.services().count(), 0);
    }

    #[test]
    fn test_invariant_holds_for_unordered_stream() {
        let mut estimator = SlidingWindowEstimator::new(30.0, "monitoring");
        let offsets = [5.0, 50.0, 12.0, 49.0, 90.0, 61.0, 33.0, 120.0, 119.0, 200.0, 150.0];
        let mut last_newest = f64::MIN;

        for chunk in offsets.chunks(3) {
            let events: Vec<(&str, f64, &str)> = chunk
                .iter()
                .map(|o| ("monitoring", T + o, "HTTP Status Code: 500"))
                .collect();

            if let Some(estimate) = estimator.consume(&batch(&events)) {
                assert!(estimate.newest_considered >= last_newest);
                last_newest = estimate.newest_considered;
                assert_window_invariant(&estimator, &estimate);
            }
        }

        assert_eq!(last_newest, T + 200.0);
    }

    #[test]
    fn test_only_exact_200_is_clean() {
        let mut estimator = SlidingWindowEstimator::new(60.0, "monitoring");

        let estimate = estimator
            .consume(&batch(&[
                ("monitoring", T + 1.0, "HTTP Status Code: 2000"),
                ("monitoring", T + 2.0, "HTTP Status Code:200"),
                ("monitoring", T + 3.0, "HTTP Status Code: 200 OK"),
            ]))
            .unwrap();

        assert_eq!(estimate.value, 1.0);
        assert_eq!(estimator.retained_failures("monitoring")[0].0, T + 1.0);
    }
}
