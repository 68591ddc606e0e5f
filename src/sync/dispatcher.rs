//! Rate-limited batch delivery.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use notion_sink::RemoteStore;
use serde::Serialize;
use sync_core::{BatchResult, ItemOutcome, RemoteRecord};
use tracing::{debug, error, info};

/// Everything the dispatcher did during one `deliver` call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// One result per chunk, in chunk order
    pub batches: Vec<BatchResult>,
    /// Inter-batch pauses taken
    pub delays: usize,
}

impl DispatchReport {
    pub fn chunks(&self) -> usize {
        self.batches.len()
    }

    pub fn delivered(&self) -> usize {
        self.batches.iter().map(BatchResult::delivered).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(BatchResult::failed).sum()
    }

    /// All item outcomes flattened in submission order.
    pub fn outcomes(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.batches.iter().flat_map(|batch| batch.outcomes.iter())
    }
}

/// Delivers remote records in consecutive chunks.
///
/// Every record of a chunk is created concurrently and the chunk settles
/// before the next one starts, so at most `batch_size` creates are in flight.
pub struct BatchDispatcher {
    remote: Arc<dyn RemoteStore>,
    request_timeout: Duration,
}

impl BatchDispatcher {
    pub fn new(remote: Arc<dyn RemoteStore>, request_timeout: Duration) -> Self {
        Self {
            remote,
            request_timeout,
        }
    }

    /// Deliver `records` in chunks of at most `batch_size`, pausing
    /// `inter_batch_delay` between chunks. Item failures are recorded in the
    /// report and never stop delivery.
    pub async fn deliver(
        &self,
        records: &[RemoteRecord],
        batch_size: usize,
        inter_batch_delay: Duration,
    ) -> DispatchReport {
        let batch_size = batch_size.max(1);
        let total_chunks = records.len().div_ceil(batch_size);
        let mut report = DispatchReport::default();

        for (index, chunk) in records.chunks(batch_size).enumerate() {
            debug!(
                "Dispatching batch {}/{} ({} records)",
                index + 1,
                total_chunks,
                chunk.len()
            );

            let outcomes = join_all(chunk.iter().map(|record| self.deliver_one(record))).await;
            let batch = BatchResult { index, outcomes };
            info!(
                "Batch {}/{} settled: {} delivered, {} failed",
                index + 1,
                total_chunks,
                batch.delivered(),
                batch.failed()
            );
            report.batches.push(batch);

            if index + 1 < total_chunks {
                tokio::time::sleep(inter_batch_delay).await;
                report.delays += 1;
            }
        }

        report
    }

    async fn deliver_one(&self, record: &RemoteRecord) -> ItemOutcome {
        let result =
            tokio::time::timeout(self.request_timeout, self.remote.create_record(record)).await;

        let error = match result {
            Ok(Ok(remote_id)) => {
                return ItemOutcome::Delivered {
                    source_id: record.source_id.clone(),
                    locator: record.locator.clone(),
                    remote_id,
                }
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(_) => format!("create timed out after {:?}", self.request_timeout),
        };

        error!(
            "Failed to create remote record for id {} (locator: {}): {error}",
            record.source_id, record.locator
        );
        ItemOutcome::Failed {
            source_id: record.source_id.clone(),
            locator: record.locator.clone(),
            error,
        }
    }
}
