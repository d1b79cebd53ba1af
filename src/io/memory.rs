use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;

use super::{ByteSource, ByteStream, check_range};
use crate::error::Result;

/// Archive bytes already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        check_range(start, end, self.length())?;
        let slice = self.data.slice(start as usize..=end as usize);
        Ok(Box::pin(Cursor::new(slice)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_range;

    #[tokio::test]
    async fn serves_inclusive_ranges() {
        let source = MemorySource::new(b"0123456789".to_vec());
        assert_eq!(source.length(), 10);
        assert_eq!(read_range(&source, 2, 4).await.unwrap(), b"234");
        assert_eq!(read_range(&source, 9, 9).await.unwrap(), b"9");
        assert!(source.stream_bytes(5, 10).await.is_err());
        assert!(source.stream_bytes(6, 5).await.is_err());
    }
}
