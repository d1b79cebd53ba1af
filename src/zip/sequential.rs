use tokio::io::AsyncRead;

use crate::error::Result;
use crate::io::ByteCursor;

use super::decoder::decode_local_file;
use super::structures::{LOCAL_FILE_SIGNATURE, ZipEntry};

/// Decodes a whole archive from a forward-only stream.
///
/// Local file records are yielded in stream order. The first signature of
/// any other kind (normally the central directory) ends the sequence without
/// being decoded, as does the end of the stream.
pub struct ZipStreamReader<R> {
    cursor: ByteCursor<R>,
    done: bool,
}

impl<R: AsyncRead + Unpin> ZipStreamReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            cursor: ByteCursor::new(reader),
            done: false,
        }
    }

    pub async fn next_entry(&mut self) -> Result<Option<ZipEntry>> {
        if self.done {
            return Ok(None);
        }
        let result = match self.cursor.try_read_u32().await {
            Ok(Some(LOCAL_FILE_SIGNATURE)) => decode_local_file(&mut self.cursor).await.map(Some),
            Ok(Some(signature)) => {
                tracing::debug!(signature, "end of local file records");
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result.map(|record| record.map(ZipEntry::from))
    }

    /// Drain the rest of the stream.
    pub async fn collect(mut self) -> Result<Vec<ZipEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
