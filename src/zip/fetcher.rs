//! Concurrency-capped range fetching.
//!
//! Each partition becomes one range request running on its own task. A
//! [`FetchGate`] bounds how many requests are being opened at once; a slot
//! is held until the request has been issued and its body stream returned,
//! not for the whole transfer.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Result, ZipError};
use crate::io::{ByteSource, ByteStream};

use super::partition::Partition;

/// Shared cap on simultaneous range requests.
#[derive(Debug, Clone)]
pub struct FetchGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl FetchGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a request.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A partition paired with the task fetching its bytes.
///
/// Dropping a ticket aborts its fetch.
pub struct FetchTicket {
    partition: Partition,
    handle: JoinHandle<Result<ByteStream>>,
}

impl FetchTicket {
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Wait for the request to be issued and return its body.
    pub async fn stream(&mut self) -> Result<ByteStream> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "fetch task did not complete");
                Err(ZipError::FetchAborted(e.to_string()))
            }
        }
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Issues one range request per partition through a [`FetchGate`].
pub struct BoundedFetcher<S: ByteSource + 'static> {
    source: Arc<S>,
    gate: FetchGate,
}

impl<S: ByteSource + 'static> BoundedFetcher<S> {
    pub fn new(source: Arc<S>, gate: FetchGate) -> Self {
        Self { source, gate }
    }

    pub fn gate(&self) -> &FetchGate {
        &self.gate
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Start fetching `partition`. Empty partitions are a no-op.
    pub fn submit(&self, partition: Partition) -> Option<FetchTicket> {
        let (start, end) = partition.byte_range()?;
        let end = end.min(self.source.length().saturating_sub(1));
        let source = Arc::clone(&self.source);
        let semaphore = Arc::clone(&self.gate.semaphore);
        let entries = partition.len();

        tracing::debug!(start, end, entries, "submitting partition");
        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| ZipError::FetchAborted(e.to_string()))?;
            source.stream_bytes(start, end).await.inspect_err(|e| {
                tracing::error!(start, end, error = %e, "range fetch failed");
            })
        });

        Some(FetchTicket { partition, handle })
    }
}
