//! Pull-based reader used by the record decoder.
//!
//! A [`ByteCursor`] wraps any [`AsyncRead`] (a network body, a file, or an
//! in-memory buffer) and hands out exact-size reads. [`ByteCursor::limited`]
//! carves out a window of the next `n` bytes that reports end-of-data once
//! the window is used up, without pulling anything past it from the parent.

use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt, Take};

use crate::error::{Result, ZipError};

/// Largest buffer reserved up front for a single read.
const PREALLOC_LIMIT: usize = 64 * 1024;

pub struct ByteCursor<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> ByteCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read exactly `n` bytes, failing if the source ends first.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        // `n` comes from untrusted headers; grow with the data actually read.
        let mut buf = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        (&mut self.inner)
            .take(n as u64)
            .read_to_end(&mut buf)
            .await
            .inspect_err(|e| tracing::error!(needed = n, error = %e, "byte source read failed"))?;
        let got = buf.len();
        if got < n {
            tracing::error!(needed = n, got, "byte source ended early");
            return Err(ZipError::UnexpectedEof { needed: n, got });
        }
        Ok(buf)
    }

    /// Read `n` bytes and decode them as UTF-8, replacing invalid sequences.
    pub async fn read_text(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_exact(n).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a little-endian `u32`, or `None` if the source is already exhausted.
    ///
    /// A source that ends part-way through the four bytes is an error.
    pub async fn try_read_u32(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; 4];
        match self.fill(&mut buf).await? {
            0 => Ok(None),
            4 => Ok(Some(LittleEndian::read_u32(&buf))),
            got => {
                tracing::error!(needed = 4, got, "byte source ended inside a signature");
                Err(ZipError::UnexpectedEof { needed: 4, got })
            }
        }
    }

    /// Read everything that is left.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner
            .read_to_end(&mut buf)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "byte source read failed"))?;
        Ok(buf)
    }

    /// A sub-cursor exposing only the next `n` bytes.
    pub fn limited(&mut self, n: u64) -> ByteCursor<Take<&mut R>> {
        ByteCursor::new((&mut self.inner).take(n))
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .inner
                .read(&mut buf[filled..])
                .await
                .inspect_err(|e| tracing::error!(error = %e, "byte source read failed"))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}
