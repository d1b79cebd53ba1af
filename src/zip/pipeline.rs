//! Selective extraction from a randomly addressable archive.
//!
//! ## Flow
//!
//! 1. Locate the central directory (one or two backward range reads)
//! 2. Stream its records through the selection predicate
//! 3. Group the survivors into partitions of nearby entries
//! 4. Fetch each partition with one range request, capped by a [`FetchGate`]
//! 5. Decode local file records from each partition, in submission order
//!
//! Steps 1-4 run on a producer task that hands [`FetchTicket`]s to the
//! consumer over a channel. Partitions finish downloading in any order but
//! are drained strictly first-in first-out, so a slow partition at the head
//! holds back the ones behind it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ReaderOptions;
use crate::error::{Result, ZipError};
use crate::io::{ByteCursor, ByteSource, ByteStream};

use super::central::CentralDirectoryStream;
use super::decoder::decode_next;
use super::fetcher::{BoundedFetcher, FetchGate, FetchTicket};
use super::locator::locate_central_directory;
use super::partition::{Partition, Partitioner};
use super::structures::*;

/// A remote (or local) archive read through range requests.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use zipfetch::{HttpRangeReader, RemoteArchive, default_predicate};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let reader = HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?;
///     let archive = RemoteArchive::new(Arc::new(reader));
///
///     let mut entries = archive.extract(default_predicate);
///     while let Some(entry) = entries.next_entry().await? {
///         println!("{}: {} bytes", entry.name(), entry.bytes()?.len());
///     }
///     Ok(())
/// }
/// ```
pub struct RemoteArchive<S: ByteSource + 'static> {
    source: Arc<S>,
    options: ReaderOptions,
    gate: FetchGate,
}

impl<S: ByteSource + 'static> RemoteArchive<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: Arc<S>, options: ReaderOptions) -> Self {
        let gate = FetchGate::new(options.concurrency);
        Self {
            source,
            options,
            gate,
        }
    }

    /// Use `gate` instead of a private one, sharing its budget with every
    /// other archive that holds it.
    pub fn with_gate(mut self, gate: FetchGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &FetchGate {
        &self.gate
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Stream the central directory records.
    pub async fn central_directory(&self) -> Result<CentralDirectoryStream> {
        let region = locate_central_directory(self.source.as_ref(), self.options.chunk_size).await?;
        Ok(CentralDirectoryStream::new(region.into_stream()))
    }

    /// The end of central directory record.
    pub async fn end_of_central_directory(&self) -> Result<EndOfCentralDirectoryRecord> {
        let region = locate_central_directory(self.source.as_ref(), self.options.chunk_size).await?;
        Ok(region.eocd)
    }

    /// Every central directory record, in on-disk order.
    pub async fn list(&self) -> Result<Vec<CentralDirectoryRecord>> {
        let mut records = Vec::new();
        let mut stream = self.central_directory().await?;
        while let Some(record) = stream.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Extract the entries accepted by `predicate`.
    ///
    /// Fetching starts immediately on the current tokio runtime; entries are
    /// decoded as the returned sequence is pulled.
    pub fn extract<F>(&self, predicate: F) -> ExtractedEntries
    where
        F: Fn(&CentralDirectoryRecord) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher = BoundedFetcher::new(Arc::clone(&self.source), self.gate.clone());
        let options = self.options;
        let producer = tokio::spawn(async move {
            if let Err(e) = produce(fetcher, options, &predicate, &tx).await {
                let _ = tx.send(Err(e));
            }
        });

        ExtractedEntries {
            tickets: rx,
            producer: Some(producer),
            active: None,
            finished: false,
        }
    }
}

async fn produce<S: ByteSource + 'static>(
    fetcher: BoundedFetcher<S>,
    options: ReaderOptions,
    predicate: &Predicate,
    tx: &mpsc::UnboundedSender<Result<FetchTicket>>,
) -> Result<()> {
    let region = locate_central_directory(fetcher.source().as_ref(), options.chunk_size).await?;
    let mut records = CentralDirectoryStream::new(region.into_stream());
    let mut partitioner = Partitioner::new(options.max_gap);

    while let Some(record) = records.next_record().await? {
        if !predicate(&record) {
            continue;
        }
        if let Some(partition) = partitioner.push(record) {
            submit(&fetcher, partition, tx)?;
        }
    }
    submit(&fetcher, partitioner.finish(), tx)
}

fn submit<S: ByteSource + 'static>(
    fetcher: &BoundedFetcher<S>,
    partition: Partition,
    tx: &mpsc::UnboundedSender<Result<FetchTicket>>,
) -> Result<()> {
    if let Some(ticket) = fetcher.submit(partition) {
        tx.send(Ok(ticket))
            .map_err(|_| ZipError::FetchAborted("entry consumer went away".to_string()))?;
    }
    Ok(())
}

struct ActivePartition {
    cursor: ByteCursor<ByteStream>,
    pending: HashSet<String>,
}

/// The demand-driven sequence of extracted entries.
///
/// Dropping it cancels the producer and every fetch still in flight.
pub struct ExtractedEntries {
    tickets: mpsc::UnboundedReceiver<Result<FetchTicket>>,
    producer: Option<JoinHandle<()>>,
    active: Option<ActivePartition>,
    finished: bool,
}

impl ExtractedEntries {
    /// Pull the next entry, or `None` once every partition is drained.
    ///
    /// After an error the sequence is over.
    pub async fn next_entry(&mut self) -> Result<Option<ZipEntry>> {
        if self.finished {
            return Ok(None);
        }
        let result = self.advance().await;
        if !matches!(result, Ok(Some(_))) {
            self.finish();
        }
        result
    }

    /// Drain the rest of the sequence.
    pub async fn collect(mut self) -> Result<Vec<ZipEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn advance(&mut self) -> Result<Option<ZipEntry>> {
        loop {
            let Some(active) = self.active.as_mut() else {
                match self.tickets.recv().await {
                    Some(ticket) => {
                        let mut ticket = ticket?;
                        let stream = ticket.stream().await?;
                        self.active = Some(ActivePartition {
                            cursor: ByteCursor::new(stream),
                            pending: ticket.partition().names(),
                        });
                        continue;
                    }
                    None => return self.producer_outcome().await.map(|_| None),
                }
            };

            match decode_next(&mut active.cursor).await? {
                Record::LocalFile(record) => {
                    if !active.pending.remove(&record.file_name) {
                        tracing::debug!(name = %record.file_name, "skipping unrequested entry");
                        continue;
                    }
                    if active.pending.is_empty() {
                        tracing::debug!("partition drained");
                        self.active = None;
                    }
                    return Ok(Some(ZipEntry::from(record)));
                }
                other => {
                    if !active.pending.is_empty() {
                        tracing::warn!(
                            missing = active.pending.len(),
                            record = record_kind(&other),
                            "partition ended before all requested entries"
                        );
                    }
                    self.active = None;
                }
            }
        }
    }

    async fn producer_outcome(&mut self) -> Result<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        producer.await.map_err(|e| {
            tracing::error!(error = %e, "entry producer did not complete");
            ZipError::FetchAborted(e.to_string())
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        self.active = None;
        self.tickets.close();
        // Dropping queued tickets aborts their fetches.
        while self.tickets.try_recv().is_ok() {}
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for ExtractedEntries {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

fn record_kind(record: &Record) -> &'static str {
    match record {
        Record::LocalFile(_) => "local file",
        Record::CentralDirectory(_) => "central directory",
        Record::EndOfCentralDirectory(_) => "end of central directory",
        Record::Unrecognized(_) => "unrecognized",
        Record::Exhausted => "end of data",
    }
}
