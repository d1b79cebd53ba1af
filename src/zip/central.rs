use crate::error::{Result, ZipError};
use crate::io::{ByteCursor, ByteStream};

use super::decoder::decode_next;
use super::structures::{CentralDirectoryRecord, Record};

/// Lazily decodes central directory records, one per call, in on-disk order.
pub struct CentralDirectoryStream {
    cursor: ByteCursor<ByteStream>,
    done: bool,
}

impl CentralDirectoryStream {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            cursor: ByteCursor::new(stream),
            done: false,
        }
    }

    /// The next record, or `None` once the trailer or the end of data is reached.
    pub async fn next_record(&mut self) -> Result<Option<CentralDirectoryRecord>> {
        if self.done {
            return Ok(None);
        }
        match decode_next(&mut self.cursor).await {
            Ok(Record::CentralDirectory(record)) => Ok(Some(record)),
            Ok(Record::EndOfCentralDirectory(_)) | Ok(Record::Exhausted) => {
                self.done = true;
                Ok(None)
            }
            Ok(Record::LocalFile(_)) => {
                self.done = true;
                tracing::error!("local file header inside the central directory");
                Err(ZipError::UnexpectedSignature {
                    expected: "central directory header",
                    found: super::structures::LOCAL_FILE_SIGNATURE,
                })
            }
            Ok(Record::Unrecognized(found)) => {
                self.done = true;
                tracing::error!(found, "unexpected signature in central directory");
                Err(ZipError::UnexpectedSignature {
                    expected: "central directory header",
                    found,
                })
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(bytes: Vec<u8>) -> ByteStream {
        Box::pin(Cursor::new(bytes))
    }

    #[tokio::test]
    async fn stops_at_end_of_data() {
        let mut records = CentralDirectoryStream::new(stream(Vec::new()));
        assert!(records.next_record().await.unwrap().is_none());
        assert!(records.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_where_a_record_belongs_is_fatal() {
        let mut records = CentralDirectoryStream::new(stream(b"junkjunk".to_vec()));
        let err = records.next_record().await.unwrap_err();
        assert!(matches!(err, ZipError::UnexpectedSignature { .. }));
        assert!(records.next_record().await.unwrap().is_none());
    }
}
