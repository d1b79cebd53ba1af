use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;

use super::{ByteSource, ByteStream, check_range};
use crate::error::{Result, ZipError};

/// HTTP Range reader for remote ZIP files
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            tracing::error!(%url, status = %resp.status(), "HEAD request failed");
            return Err(ZipError::UnexpectedStatus(resp.status()));
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            tracing::error!(%url, accept_ranges, "server does not advertise byte ranges");
            return Err(ZipError::RangeNotSupported);
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                tracing::error!(%url, "HEAD response has no Content-Length");
                ZipError::MissingContentLength
            })?;

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Number of attempts made to open a range before giving up
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ByteSource for HttpRangeReader {
    fn length(&self) -> u64 {
        self.size
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        check_range(start, end, self.size)?;
        let range = format!("bytes={}-{}", start, end);
        let mut retry_count = 0;

        // Only opening the connection is retried; a body that fails mid-transfer
        // surfaces to the reader.
        let resp = loop {
            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => break resp,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        tracing::error!(%range, error = %e, "max retries exceeded");
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => {
                    tracing::error!(%range, error = %e, "range request failed");
                    return Err(e.into());
                }
            }
        };

        if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
            tracing::error!(%range, status = %resp.status(), "range request rejected");
            return Err(ZipError::UnexpectedStatus(resp.status()));
        }

        let transferred = Arc::clone(&self.transferred_bytes);
        let body = resp
            .bytes_stream()
            .inspect_ok(move |chunk| {
                transferred.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .map_err(std::io::Error::other);

        Ok(Box::pin(StreamReader::new(body)))
    }
}
