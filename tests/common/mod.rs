#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};
use zipfetch::{ByteSource, ByteStream, MemorySource, ZipError};

pub enum Item<'a> {
    File(&'a str, &'a [u8]),
    Stored(&'a str, &'a [u8]),
    Dir(&'a str),
}

/// Build an archive in memory.
pub fn build_zip(items: &[Item<'_>], comment: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for item in items {
        match item {
            Item::File(name, data) => {
                writer.start_file(*name, deflated).unwrap();
                writer.write_all(data).unwrap();
            }
            Item::Stored(name, data) => {
                writer.start_file(*name, stored).unwrap();
                writer.write_all(data).unwrap();
            }
            Item::Dir(name) => {
                writer.add_directory(*name, stored).unwrap();
            }
        }
    }
    writer.set_comment(comment);
    writer.finish().unwrap().into_inner()
}

/// Deterministic, mildly compressible content.
pub fn content(seed: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| b"abcdefghij"[(i * seed + i / 7) % 10]).collect()
}

/// A [`MemorySource`] that counts requests, records how many were open at
/// once, and can be slowed down or made to fail.
pub struct InstrumentedSource {
    inner: MemorySource,
    length: u64,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub requests: AtomicUsize,
    delay: Box<dyn Fn(u64) -> Duration + Send + Sync>,
    fail_after: Option<usize>,
}

impl InstrumentedSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            length: bytes.len() as u64,
            inner: MemorySource::new(bytes),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            delay: Box::new(|_| Duration::ZERO),
            fail_after: None,
        }
    }

    /// Delay each request by `delay(start)` before answering.
    pub fn with_delay(mut self, delay: impl Fn(u64) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Fail every request after the first `n`.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ByteSource for InstrumentedSource {
    fn length(&self) -> u64 {
        self.length
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> zipfetch::Result<ByteStream> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(start);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(ZipError::Io(std::io::Error::other("connection reset")));
        }
        self.inner.stream_bytes(start, end).await
    }
}

pub fn memory(bytes: Vec<u8>) -> Arc<MemorySource> {
    Arc::new(MemorySource::new(bytes))
}
