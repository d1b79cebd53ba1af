//! Finding the central directory from the end of an archive.
//!
//! The end of central directory record sits in front of an archive comment
//! of 0 to 65535 bytes, so its position is unknown. The locator reads the
//! source backwards in fixed-size chunks, prepending each chunk to what it
//! already holds, and scans each fresh chunk from its last byte down for the
//! record's signature. A signature may straddle two chunks; the scan sees
//! the following bytes because they are already buffered.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ZipError};
use crate::io::{ByteCursor, ByteSource, ByteStream, read_range};

use super::decoder::decode_end_of_central_directory;
use super::structures::{END_OF_CENTRAL_DIRECTORY_SIGNATURE, EndOfCentralDirectoryRecord};

/// The located central directory.
#[derive(Debug)]
pub struct CentralDirectoryRegion {
    /// Absolute offset of the first central directory byte
    pub offset: u64,
    /// Absolute offset of the end of central directory record
    pub eocd_offset: u64,
    pub eocd: EndOfCentralDirectoryRecord,
    /// Bytes from the start of the central directory to the end of the archive
    pub data: Vec<u8>,
}

impl CentralDirectoryRegion {
    /// A stream positioned at the first central directory record.
    pub fn into_stream(self) -> ByteStream {
        Box::pin(Cursor::new(self.data))
    }
}

const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// Locate the central directory of `source`, reading `chunk_size` bytes at a time.
///
/// A trailer whose comment ends exactly at the end of the archive wins. When
/// there is none (bytes were appended after the archive), the highest trailer
/// whose comment fits and whose directory offset precedes it is used.
pub async fn locate_central_directory<S: ByteSource + ?Sized>(
    source: &S,
    chunk_size: u64,
) -> Result<CentralDirectoryRegion> {
    let length = source.length();
    let chunk_size = chunk_size.max(1);
    // No trailer below this offset can reach the end of the archive.
    let exact_floor =
        length.saturating_sub(EndOfCentralDirectoryRecord::FIXED_SIZE as u64 + MAX_COMMENT_LEN);

    // Holds the archive bytes from `chunk_start` to the end.
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk_end = length;
    let mut fallback: Option<u64> = None;
    let mut rejected: Option<ZipError> = None;

    while chunk_end > 0 {
        let chunk_start = chunk_end.saturating_sub(chunk_size);
        let mut chunk = read_range(source, chunk_start, chunk_end - 1).await?;
        let fresh = chunk.len();
        chunk.extend_from_slice(&buffer);
        buffer = chunk;

        for i in (0..fresh).rev() {
            if i + 4 > buffer.len()
                || LittleEndian::read_u32(&buffer[i..i + 4]) != END_OF_CENTRAL_DIRECTORY_SIGNATURE
            {
                continue;
            }

            let eocd_offset = chunk_start + i as u64;
            if i + EndOfCentralDirectoryRecord::FIXED_SIZE > buffer.len() {
                // Nothing can follow the end of the archive, so this cannot be
                // resolved by reading more.
                tracing::error!(eocd_offset, length, "end of central directory is truncated");
                return Err(ZipError::TruncatedEndOfCentralDirectory {
                    offset: eocd_offset,
                });
            }

            let cd_offset = LittleEndian::read_u32(&buffer[i + 16..i + 20]) as u64;
            let comment_len = LittleEndian::read_u16(&buffer[i + 20..i + 22]) as u64;
            let comment_end = eocd_offset + EndOfCentralDirectoryRecord::FIXED_SIZE as u64 + comment_len;
            if comment_end > length {
                tracing::debug!(eocd_offset, comment_len, "skipping trailer with overlong comment");
                continue;
            }
            if cd_offset > eocd_offset {
                tracing::debug!(cd_offset, eocd_offset, "skipping trailer pointing past itself");
                rejected.get_or_insert(ZipError::InvalidCentralDirectoryOffset {
                    cd_offset,
                    eocd_offset,
                });
                continue;
            }
            if comment_end == length {
                return resolve(source, buffer, chunk_start, eocd_offset).await;
            }
            if fallback.is_none() {
                tracing::debug!(eocd_offset, trailing = length - comment_end, "trailer followed by extra bytes");
                fallback = Some(eocd_offset);
            }
        }

        if chunk_start <= exact_floor
            && let Some(eocd_offset) = fallback
        {
            tracing::warn!(eocd_offset, length, "archive has bytes after its trailer");
            return resolve(source, buffer, chunk_start, eocd_offset).await;
        }
        chunk_end = chunk_start;
    }

    if let Some(err) = rejected {
        tracing::error!(error = %err, "no usable end of central directory");
        return Err(err);
    }
    tracing::error!(length, "central directory not found");
    Err(ZipError::CentralDirectoryNotFound)
}

/// Decode the trailer at `eocd_offset` and trim or backfill `buffer`, which
/// holds the archive from `buffer_start` to its end, to start at the directory.
async fn resolve<S: ByteSource + ?Sized>(
    source: &S,
    mut buffer: Vec<u8>,
    buffer_start: u64,
    eocd_offset: u64,
) -> Result<CentralDirectoryRegion> {
    let i = (eocd_offset - buffer_start) as usize;
    let eocd = {
        let mut cursor = ByteCursor::new(&buffer[i + 4..]);
        decode_end_of_central_directory(&mut cursor).await?
    };
    let cd_offset = eocd.cd_offset as u64;

    if cd_offset < buffer_start {
        let mut prefix = read_range(source, cd_offset, buffer_start - 1).await?;
        prefix.extend_from_slice(&buffer);
        buffer = prefix;
    } else {
        buffer.drain(..(cd_offset - buffer_start) as usize);
    }

    tracing::debug!(
        cd_offset,
        eocd_offset,
        entries = eocd.total_entries,
        "located central directory"
    );
    Ok(CentralDirectoryRegion {
        offset: cd_offset,
        eocd_offset,
        eocd,
        data: buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;
    use byteorder::WriteBytesExt;

    fn eocd_bytes(cd_offset: u32, cd_size: u32, comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(comment.len() as u16).unwrap();
        out.extend_from_slice(comment);
        out
    }

    /// 100 bytes of "file data", an 8-byte fake central directory, then the trailer.
    fn archive(comment: &[u8]) -> Vec<u8> {
        let mut out = vec![b'.'; 100];
        out.extend_from_slice(b"CDCDCDCD");
        out.extend(eocd_bytes(100, 8, comment));
        out
    }

    #[tokio::test]
    async fn finds_trailer_without_comment() {
        let source = MemorySource::new(archive(b""));
        let region = locate_central_directory(&source, 50 * 1024).await.unwrap();
        assert_eq!(region.offset, 100);
        assert_eq!(region.eocd_offset, 108);
        assert_eq!(&region.data[..8], b"CDCDCDCD");
        assert_eq!(region.data.len(), 8 + 22);
    }

    #[tokio::test]
    async fn backfills_directory_before_the_first_chunk() {
        let source = MemorySource::new(archive(b"hi"));
        // The trailer fits in the last chunk, the directory does not.
        let region = locate_central_directory(&source, 26).await.unwrap();
        assert_eq!(region.offset, 100);
        assert_eq!(region.eocd.comment, b"hi");
        assert_eq!(&region.data[..8], b"CDCDCDCD");
    }

    #[tokio::test]
    async fn handles_signature_straddling_chunks() {
        let comment = vec![b'#'; 40];
        let bytes = archive(&comment);
        let source = MemorySource::new(bytes.clone());
        // Small chunks put boundaries inside the comment and the trailer header.
        for chunk_size in [3, 7, 16, 61, 62, 63] {
            let region = locate_central_directory(&source, chunk_size).await.unwrap();
            assert_eq!(region.offset, 100, "chunk size {chunk_size}");
            assert_eq!(region.data, bytes[100..], "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn ignores_signature_inside_comment() {
        let mut comment = b"xx".to_vec();
        comment.extend(eocd_bytes(0, 0, b""));
        comment.extend_from_slice(b"yy");
        let source = MemorySource::new(archive(&comment));
        let region = locate_central_directory(&source, 10).await.unwrap();
        assert_eq!(region.offset, 100);
    }

    #[tokio::test]
    async fn tolerates_bytes_appended_after_the_archive() {
        let mut bytes = archive(b"note");
        bytes.push(b'\n');
        let source = MemorySource::new(bytes);
        for chunk_size in [4, 30, 50 * 1024] {
            let region = locate_central_directory(&source, chunk_size).await.unwrap();
            assert_eq!(region.offset, 100, "chunk size {chunk_size}");
            assert_eq!(region.eocd_offset, 108);
            assert_eq!(region.eocd.comment, b"note");
        }
    }

    #[tokio::test]
    async fn trailer_pointing_past_itself_is_rejected() {
        let mut bytes = vec![b'.'; 50];
        bytes.extend(eocd_bytes(900, 8, b""));
        let err = locate_central_directory(&MemorySource::new(bytes), 64).await.unwrap_err();
        assert!(matches!(
            err,
            ZipError::InvalidCentralDirectoryOffset { cd_offset: 900, eocd_offset: 50 }
        ));
    }

    #[tokio::test]
    async fn missing_trailer_is_not_found() {
        let source = MemorySource::new(vec![0u8; 300]);
        let err = locate_central_directory(&source, 64).await.unwrap_err();
        assert!(matches!(err, ZipError::CentralDirectoryNotFound));
    }

    #[tokio::test]
    async fn trailer_cut_short_is_fatal() {
        let mut bytes = archive(b"");
        bytes.truncate(bytes.len() - 5);
        let source = MemorySource::new(bytes);
        let err = locate_central_directory(&source, 64).await.unwrap_err();
        assert!(matches!(err, ZipError::TruncatedEndOfCentralDirectory { .. }));
    }
}
