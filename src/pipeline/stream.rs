use crate::config::{Config, SourceConfig};
use crate::estimator::{Estimate, Estimator, EstimatorError, EstimatorKind, SharedReservoir};
use crate::pipeline::run_sampler;
use crate::source::{Batch, DirectoryWatcher, WatchError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest a puller waits on an empty reservoir before re-checking state
const SAMPLE_WAIT: Duration = Duration::from_millis(500);

/// Errors raised while starting a pipeline. Nothing has been spawned when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("watcher error: {0}")]
    Watch(#[from] WatchError),

    #[error("estimator error: {0}")]
    Estimator(#[from] EstimatorError),
}

enum Consumer {
    Inline {
        input: Receiver<Batch>,
        estimator: Box<dyn Estimator>,
    },
    Sampled {
        shared: Arc<SharedReservoir>,
        worker: JoinHandle<()>,
    },
}

/// The lazy, unbounded sequence of estimates produced by one pipeline.
///
/// Pull with [`ResultStream::next`]. Stopping pulling does not stop the
/// background tasks; cancel the token for that.
pub struct ResultStream {
    estimator_name: &'static str,
    consumer: Consumer,
    watcher: JoinHandle<()>,
    cancel: CancellationToken,
    emitted: u64,
}

impl ResultStream {
    /// Start the watcher (and the reservoir worker, if needed) on the current
    /// tokio runtime.
    pub fn start(
        source: &SourceConfig,
        estimator: EstimatorKind,
        cancel: CancellationToken,
    ) -> Result<Self, PipelineError> {
        let watcher = DirectoryWatcher::new(source)?;
        let estimator_name = estimator.name();
        // Bounded: a full channel parks the watcher until the estimator catches up
        let (tx, rx) = mpsc::channel::<Batch>(source.channel_capacity.max(1));

        info!(
            estimator = estimator_name,
            path = %source.path.display(),
            channel_capacity = source.channel_capacity,
            "Starting pipeline"
        );

        let watcher = tokio::spawn(watcher.run(tx, cancel.clone()));

        let consumer = match estimator {
            EstimatorKind::Inline(estimator) => Consumer::Inline {
                input: rx,
                estimator,
            },
            EstimatorKind::Sampled(estimator) => {
                let shared = Arc::new(SharedReservoir::new(estimator));
                let worker = tokio::spawn(run_sampler(rx, Arc::clone(&shared), cancel.clone()));
                Consumer::Sampled { shared, worker }
            }
        };

        Ok(Self {
            estimator_name,
            consumer,
            watcher,
            cancel,
            emitted: 0,
        })
    }

    /// Build the configured estimator and start the pipeline.
    ///
    /// Configuration errors are returned before any task is spawned.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, PipelineError> {
        let estimator = EstimatorKind::from_config(&config.estimator)?;
        Self::start(&config.source, estimator, cancel)
    }

    /// Wait for the next estimate.
    ///
    /// Returns `None` once cancelled, or when the watcher has gone away and no
    /// more batches can arrive.
    pub async fn next(&mut self) -> Option<Estimate> {
        let estimate = match &mut self.consumer {
            Consumer::Inline { input, estimator } => {
                next_inline(input, estimator.as_mut(), &self.cancel).await
            }
            Consumer::Sampled { shared, .. } => next_sampled(shared, &self.cancel).await,
        }?;

        self.emitted += 1;
        debug!(
            estimator = self.estimator_name,
            value = estimate.value,
            newest = estimate.newest_considered,
            oldest = estimate.oldest_considered,
            "Estimate emitted"
        );
        Some(estimate)
    }

    pub fn estimator_name(&self) -> &'static str {
        self.estimator_name
    }

    /// Whether pulls may repeat an estimate built from unchanged state
    pub fn may_repeat(&self) -> bool {
        matches!(self.consumer, Consumer::Sampled { .. })
    }

    /// Estimates handed out so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the background tasks to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Consumer::Sampled { worker, .. } = self.consumer {
            let _ = worker.await;
        }
        let _ = self.watcher.await;

        info!(
            estimator = self.estimator_name,
            emitted = self.emitted,
            "Pipeline shutdown complete"
        );
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl futures::Stream<Item = Estimate> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|estimate| (estimate, stream))
        })
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("estimator", &self.estimator_name)
            .field("emitted", &self.emitted)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn next_inline(
    input: &mut Receiver<Batch>,
    estimator: &mut dyn Estimator,
    cancel: &CancellationToken,
) -> Option<Estimate> {
    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            received = input.recv() => match received {
                Some(batch) => batch,
                None => return None,
            },
        };

        if let Some(estimate) = estimator.consume(&batch) {
            return Some(estimate);
        }
        debug!(batch_id = %batch.id, events = batch.len(), "Batch produced no estimate");
    }
}

async fn next_sampled(shared: &SharedReservoir, cancel: &CancellationToken) -> Option<Estimate> {
    loop {
        if cancel.is_cancelled() {
            return None;
        }

        if let Some(estimate) = shared.current() {
            return Some(estimate);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = shared.wait_for_update(SAMPLE_WAIT) => {}
        }
    }
}
