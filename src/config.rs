//! Tuning knobs for the selective reader.

/// Size of each backward read while searching for the end of central directory.
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024;

/// Partitions are flushed one byte before strict contiguity, so adjacent
/// entries are fetched separately.
pub const DEFAULT_MAX_GAP: i64 = -1;

/// Simultaneous range requests allowed per fetch gate.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Options controlling how a [`RemoteArchive`](crate::RemoteArchive) reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub chunk_size: u64,
    pub max_gap: i64,
    pub concurrency: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_gap: DEFAULT_MAX_GAP,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ReaderOptions {
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn max_gap(mut self, max_gap: i64) -> Self {
        self.max_gap = max_gap;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}
