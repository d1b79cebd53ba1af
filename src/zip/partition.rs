//! Grouping nearby central directory records into single range fetches.

use std::collections::HashSet;

use super::structures::CentralDirectoryRecord;

/// Records fetched together as one byte range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    records: Vec<CentralDirectoryRecord>,
}

impl Partition {
    pub fn records(&self) -> &[CentralDirectoryRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Inclusive byte range covering every record, or `None` when empty.
    pub fn byte_range(&self) -> Option<(u64, u64)> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        Some((first.first_byte_at, last.last_byte_at))
    }

    /// Names of the entries this partition was created for.
    pub fn names(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.file_name.clone()).collect()
    }
}

/// Streaming partitioner.
///
/// A record starts a new partition when it begins more than `max_gap` bytes
/// after the previous record ends. A record that begins before its
/// predecessor also starts a new one, so each partition stays ascending and
/// its byte range covers all of its records.
#[derive(Debug)]
pub struct Partitioner {
    max_gap: i64,
    last_file_ends_at: Option<u64>,
    last_file_starts_at: u64,
    current: Partition,
}

impl Partitioner {
    pub fn new(max_gap: i64) -> Self {
        Self {
            max_gap,
            last_file_ends_at: None,
            last_file_starts_at: 0,
            current: Partition::default(),
        }
    }

    /// Add a record, returning the partition it closed off, if any.
    pub fn push(&mut self, record: CentralDirectoryRecord) -> Option<Partition> {
        let mut flushed = None;
        if let Some(ends_at) = self.last_file_ends_at {
            let out_of_order = record.first_byte_at < self.last_file_starts_at;
            if out_of_order {
                tracing::debug!(
                    name = %record.file_name,
                    first_byte_at = record.first_byte_at,
                    "central directory is not in offset order"
                );
            }
            let starts_at = record.first_byte_at as i128;
            if out_of_order || starts_at > ends_at as i128 + self.max_gap as i128 {
                flushed = Some(std::mem::take(&mut self.current));
            }
        }
        self.last_file_ends_at = Some(record.last_byte_at);
        self.last_file_starts_at = record.first_byte_at;
        self.current.records.push(record);
        flushed
    }

    /// The last partition, possibly empty.
    pub fn finish(self) -> Partition {
        self.current
    }
}

/// Partition a complete list of records.
pub fn partition_records(
    records: impl IntoIterator<Item = CentralDirectoryRecord>,
    max_gap: i64,
) -> Vec<Partition> {
    let mut partitioner = Partitioner::new(max_gap);
    let mut partitions: Vec<Partition> = records
        .into_iter()
        .filter_map(|record| partitioner.push(record))
        .collect();
    partitions.push(partitioner.finish());
    partitions
}
