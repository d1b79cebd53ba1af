mod cursor;
mod http;
mod local;
mod memory;

pub use cursor::ByteCursor;
pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use memory::MemorySource;

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, ZipError};

/// A forward-only stream of bytes, either a live response body or a buffer.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Trait for randomly addressable data sources
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total size of the data source
    fn length(&self) -> u64;

    /// Stream the bytes in `start..=end`
    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream>;
}

/// Fetch `start..=end` from `source` fully into memory.
pub async fn read_range<S: ByteSource + ?Sized>(source: &S, start: u64, end: u64) -> Result<Vec<u8>> {
    check_range(start, end, source.length())?;
    let expected = (end - start + 1) as usize;
    let mut stream = source.stream_bytes(start, end).await?;
    let mut buf = Vec::with_capacity(expected);
    stream
        .read_to_end(&mut buf)
        .await
        .inspect_err(|e| tracing::error!(start, end, error = %e, "range read failed"))?;
    if buf.len() < expected {
        tracing::error!(start, end, got = buf.len(), "range read ended early");
        return Err(ZipError::UnexpectedEof {
            needed: expected,
            got: buf.len(),
        });
    }
    buf.truncate(expected);
    Ok(buf)
}

pub(crate) fn check_range(start: u64, end: u64, length: u64) -> Result<()> {
    if start > end || end >= length {
        tracing::error!(start, end, length, "invalid byte range");
        return Err(ZipError::InvalidRange { start, end, length });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_range_returns_the_inclusive_span() {
        let source = MemorySource::new((0..20u8).collect::<Vec<_>>());
        assert_eq!(read_range(&source, 3, 6).await.unwrap(), vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn reversed_or_out_of_bounds_range_is_rejected() {
        let source = MemorySource::new(vec![0u8; 20]);
        assert!(matches!(
            read_range(&source, 9, 2).await,
            Err(ZipError::InvalidRange { start: 9, end: 2, .. })
        ));
        assert!(matches!(
            read_range(&source, 0, 20).await,
            Err(ZipError::InvalidRange { .. })
        ));
    }
}
