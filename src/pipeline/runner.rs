use crate::estimator::SharedReservoir;
use crate::source::Batch;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Run the reservoir worker task.
///
/// Receives batches from the watcher and folds each one into the shared
/// reservoir, waking any puller that is waiting for a non-empty sample.
pub async fn run_sampler(
    mut input: Receiver<Batch>,
    shared: Arc<SharedReservoir>,
    cancel: CancellationToken,
) {
    info!("Reservoir worker started");
    let mut folded = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Shutdown requested");
                break;
            }
            result = input.recv() => {
                match result {
                    Some(batch) => {
                        debug!(batch_id = %batch.id, events = batch.len(), "Folding batch");
                        shared.fold(&batch);
                        folded += 1;
                    }
                    None => {
                        info!("Input channel closed");
                        break;
                    }
                }
            }
        }
    }

    info!(batches = folded, "Reservoir worker shutdown complete");
}
