use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{ByteSource, ByteStream, check_range};
use crate::error::Result;

/// Local file reader with random access support
///
/// Each range opens its own handle, so concurrent ranges never share a
/// file position.
pub struct LocalFileReader {
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    pub async fn new(path: &Path) -> Result<Self> {
        let size = tokio::fs::metadata(path).await?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }
}

#[async_trait]
impl ByteSource for LocalFileReader {
    fn length(&self) -> u64 {
        self.size
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        check_range(start, end, self.size)?;
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        Ok(Box::pin(file.take(end - start + 1)))
    }
}
