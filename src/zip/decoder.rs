//! Decoding of the three ZIP record shapes from a [`ByteCursor`].
//!
//! Every record starts with a 4-byte little-endian magic number. The fixed
//! header that follows is read in one piece and split with `byteorder`; the
//! variable-length name, extra and comment fields are then read in the order
//! and length the header declares.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::io::ByteCursor;

use super::structures::*;

/// Cap on the output buffer reserved from a header's declared size.
const INFLATE_PREALLOC_LIMIT: usize = 1024 * 1024;

/// Read the next signature and decode the record it announces.
pub async fn decode_next<R: AsyncRead + Unpin>(cursor: &mut ByteCursor<R>) -> Result<Record> {
    let Some(signature) = cursor.try_read_u32().await? else {
        return Ok(Record::Exhausted);
    };
    let record = match signature {
        LOCAL_FILE_SIGNATURE => Record::LocalFile(decode_local_file(cursor).await?),
        CENTRAL_DIRECTORY_SIGNATURE => {
            Record::CentralDirectory(decode_central_directory(cursor).await?)
        }
        END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
            Record::EndOfCentralDirectory(decode_end_of_central_directory(cursor).await?)
        }
        other => Record::Unrecognized(other),
    };
    Ok(record)
}

/// Decode a local file record whose signature has already been consumed.
///
/// Exactly `compressed_size` body bytes are consumed whether or not they
/// can be decompressed.
pub async fn decode_local_file<R: AsyncRead + Unpin>(
    cursor: &mut ByteCursor<R>,
) -> Result<LocalFileRecord> {
    let header = cursor.read_exact(LocalFileRecord::FIXED_SIZE - 4).await?;
    let mut fields = Cursor::new(header);

    let version = fields.read_u16::<LittleEndian>()?;
    let flags = fields.read_u16::<LittleEndian>()?;
    let compression_method = CompressionMethod::from_u16(fields.read_u16::<LittleEndian>()?);
    let last_mod_time = fields.read_u16::<LittleEndian>()?;
    let last_mod_date = fields.read_u16::<LittleEndian>()?;
    let crc32 = fields.read_u32::<LittleEndian>()?;
    let compressed_size = fields.read_u32::<LittleEndian>()?;
    let uncompressed_size = fields.read_u32::<LittleEndian>()?;
    let file_name_length = fields.read_u16::<LittleEndian>()?;
    let extra_field_length = fields.read_u16::<LittleEndian>()?;

    let file_name = cursor.read_text(file_name_length as usize).await?;
    let extra = cursor.read_exact(extra_field_length as usize).await?;

    let compressed = {
        let mut window = cursor.limited(compressed_size as u64);
        window.read_exact(compressed_size as usize).await?
    };
    let body = decompress(&file_name, compression_method, compressed, uncompressed_size);

    Ok(LocalFileRecord {
        signature: LOCAL_FILE_SIGNATURE,
        version,
        flags,
        compression_method,
        last_mod_time,
        last_mod_date,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_length,
        is_directory: file_name.ends_with('/'),
        file_name,
        extra_field_length,
        extra,
        body,
    })
}

/// Decode a central directory record whose signature has already been consumed.
pub async fn decode_central_directory<R: AsyncRead + Unpin>(
    cursor: &mut ByteCursor<R>,
) -> Result<CentralDirectoryRecord> {
    let header = cursor.read_exact(CentralDirectoryRecord::FIXED_SIZE - 4).await?;
    let mut fields = Cursor::new(header);

    let version_created = fields.read_u16::<LittleEndian>()?;
    let version_needed = fields.read_u16::<LittleEndian>()?;
    let flags = fields.read_u16::<LittleEndian>()?;
    let compression_method = CompressionMethod::from_u16(fields.read_u16::<LittleEndian>()?);
    let last_mod_time = fields.read_u16::<LittleEndian>()?;
    let last_mod_date = fields.read_u16::<LittleEndian>()?;
    let crc32 = fields.read_u32::<LittleEndian>()?;
    let compressed_size = fields.read_u32::<LittleEndian>()?;
    let uncompressed_size = fields.read_u32::<LittleEndian>()?;
    let file_name_length = fields.read_u16::<LittleEndian>()?;
    let extra_field_length = fields.read_u16::<LittleEndian>()?;
    let file_comment_length = fields.read_u16::<LittleEndian>()?;
    let disk_number = fields.read_u16::<LittleEndian>()?;
    let internal_attributes = fields.read_u16::<LittleEndian>()?;
    let external_attributes = fields.read_u32::<LittleEndian>()?;
    let first_byte_at = fields.read_u32::<LittleEndian>()? as u64;

    let file_name = cursor.read_text(file_name_length as usize).await?;
    let extra = cursor.read_exact(extra_field_length as usize).await?;
    let comment = cursor.read_exact(file_comment_length as usize).await?;

    let mut record = CentralDirectoryRecord {
        signature: CENTRAL_DIRECTORY_SIGNATURE,
        version_created,
        version_needed,
        flags,
        compression_method,
        last_mod_time,
        last_mod_date,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_length,
        extra_field_length,
        file_comment_length,
        disk_number,
        internal_attributes,
        external_attributes,
        is_directory: file_name.ends_with('/'),
        file_name,
        extra,
        comment,
        first_byte_at,
        last_byte_at: 0,
    };
    record.last_byte_at = record.compute_last_byte_at();
    Ok(record)
}

/// Decode an end of central directory record whose signature has already been consumed.
pub async fn decode_end_of_central_directory<R: AsyncRead + Unpin>(
    cursor: &mut ByteCursor<R>,
) -> Result<EndOfCentralDirectoryRecord> {
    let header = cursor
        .read_exact(EndOfCentralDirectoryRecord::FIXED_SIZE - 4)
        .await?;
    let mut fields = Cursor::new(header);

    let disk_number = fields.read_u16::<LittleEndian>()?;
    let disk_with_cd = fields.read_u16::<LittleEndian>()?;
    let disk_entries = fields.read_u16::<LittleEndian>()?;
    let total_entries = fields.read_u16::<LittleEndian>()?;
    let cd_size = fields.read_u32::<LittleEndian>()?;
    let cd_offset = fields.read_u32::<LittleEndian>()?;
    let comment_len = fields.read_u16::<LittleEndian>()?;

    let comment = cursor.read_exact(comment_len as usize).await?;

    Ok(EndOfCentralDirectoryRecord {
        signature: END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        disk_number,
        disk_with_cd,
        disk_entries,
        total_entries,
        cd_size,
        cd_offset,
        comment_len,
        comment,
    })
}

fn decompress(
    name: &str,
    method: CompressionMethod,
    compressed: Vec<u8>,
    uncompressed_size: u32,
) -> Body {
    match method {
        CompressionMethod::Stored => Body::Available(compressed),
        CompressionMethod::Deflate => {
            let mut out = Vec::with_capacity((uncompressed_size as usize).min(INFLATE_PREALLOC_LIMIT));
            match DeflateDecoder::new(compressed.as_slice()).read_to_end(&mut out) {
                Ok(_) => Body::Available(out),
                Err(e) => {
                    tracing::warn!(name, error = %e, "failed to inflate body");
                    Body::Unavailable(format!("inflate failed: {e}"))
                }
            }
        }
        CompressionMethod::Unknown(code) => {
            tracing::warn!(name, code, "unsupported compression method");
            Body::Unavailable(format!("unsupported compression method {code}"))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ZipError;
    use byteorder::WriteBytesExt;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    pub(crate) fn local_record_bytes(name: &str, method: u16, body: &[u8], size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(LOCAL_FILE_SIGNATURE).unwrap();
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(method).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(size).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(2).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&[0xAB, 0xCD]);
        out.extend_from_slice(body);
        out
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn cursor(bytes: Vec<u8>) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(bytes))
    }

    #[tokio::test]
    async fn decodes_stored_and_deflated_records_back_to_back() {
        let text = b"the quick brown fox jumps over the lazy dog, twice over";
        let mut bytes = local_record_bytes("plain.txt", 0, b"stored", 6);
        bytes.extend(local_record_bytes("packed.txt", 8, &deflate(text), text.len() as u32));
        let mut cursor = cursor(bytes);

        let Record::LocalFile(first) = decode_next(&mut cursor).await.unwrap() else {
            panic!("expected a local file record");
        };
        assert_eq!(first.file_name, "plain.txt");
        assert_eq!(first.extra, vec![0xAB, 0xCD]);
        assert_eq!(first.body, Body::Available(b"stored".to_vec()));

        let Record::LocalFile(second) = decode_next(&mut cursor).await.unwrap() else {
            panic!("expected a local file record");
        };
        assert_eq!(second.compression_method, CompressionMethod::Deflate);
        assert_eq!(second.body, Body::Available(text.to_vec()));

        assert!(matches!(decode_next(&mut cursor).await.unwrap(), Record::Exhausted));
    }

    #[tokio::test]
    async fn corrupt_body_is_unavailable_but_consumed() {
        let mut bytes = local_record_bytes("broken.bin", 8, &[0xFF; 7], 100);
        bytes.extend(local_record_bytes("next.txt", 0, b"ok", 2));
        let mut cursor = cursor(bytes);

        let Record::LocalFile(broken) = decode_next(&mut cursor).await.unwrap() else {
            panic!("expected a local file record");
        };
        assert!(matches!(broken.body, Body::Unavailable(_)));

        let Record::LocalFile(next) = decode_next(&mut cursor).await.unwrap() else {
            panic!("expected a local file record");
        };
        assert_eq!(next.file_name, "next.txt");
        assert_eq!(next.body, Body::Available(b"ok".to_vec()));
    }

    #[tokio::test]
    async fn unsupported_method_keeps_stream_aligned() {
        let mut bytes = local_record_bytes("x.lzma", 14, b"abcd", 4);
        bytes.extend(local_record_bytes("y.txt", 0, b"y", 1));
        let mut cursor = cursor(bytes);

        let Record::LocalFile(first) = decode_next(&mut cursor).await.unwrap() else {
            panic!("expected a local file record");
        };
        assert_eq!(first.compression_method, CompressionMethod::Unknown(14));
        assert!(matches!(first.body, Body::Unavailable(_)));
        assert!(matches!(
            decode_next(&mut cursor).await.unwrap(),
            Record::LocalFile(ref r) if r.file_name == "y.txt"
        ));
    }

    #[tokio::test]
    async fn unknown_signature_is_reported_not_decoded() {
        let mut cursor = cursor(vec![0x50, 0x4b, 0x07, 0x08, 1, 2, 3]);
        assert!(matches!(
            decode_next(&mut cursor).await.unwrap(),
            Record::Unrecognized(0x08074b50)
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let mut bytes = local_record_bytes("cut.txt", 0, b"0123456789", 10);
        bytes.truncate(bytes.len() - 3);
        let err = decode_next(&mut cursor(bytes)).await.unwrap_err();
        assert!(matches!(err, ZipError::UnexpectedEof { needed: 10, got: 7 }));
    }

    #[tokio::test]
    async fn huge_declared_sizes_fail_on_the_data_actually_present() {
        let mut bytes = local_record_bytes("liar.bin", 8, b"tiny", u32::MAX);
        // compressed size claims 4 GiB
        bytes[18..22].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = decode_next(&mut cursor(bytes)).await.unwrap_err();
        assert!(matches!(err, ZipError::UnexpectedEof { got: 4, .. }));
    }

    #[tokio::test]
    async fn central_record_derives_its_byte_span() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(CENTRAL_DIRECTORY_SIGNATURE).unwrap();
        bytes.write_u16::<LittleEndian>(0x031e).unwrap();
        bytes.write_u16::<LittleEndian>(20).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u16::<LittleEndian>(8).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(0xdeadbeef).unwrap();
        bytes.write_u32::<LittleEndian>(40).unwrap();
        bytes.write_u32::<LittleEndian>(90).unwrap();
        bytes.write_u16::<LittleEndian>(5).unwrap();
        bytes.write_u16::<LittleEndian>(4).unwrap();
        bytes.write_u16::<LittleEndian>(3).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u16::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(0o644 << 16).unwrap();
        bytes.write_u32::<LittleEndian>(1000).unwrap();
        bytes.extend_from_slice(b"a.txt");
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.extend_from_slice(b"hey");

        let Record::CentralDirectory(record) = decode_next(&mut cursor(bytes)).await.unwrap() else {
            panic!("expected a central directory record");
        };
        assert_eq!(record.file_name, "a.txt");
        assert_eq!(record.crc32, 0xdeadbeef);
        assert_eq!(record.comment, b"hey");
        assert_eq!(record.internal_attributes, 1);
        assert_eq!(record.first_byte_at, 1000);
        assert_eq!(record.last_byte_at, 1000 + 30 + 5 + 4 + 3 + 40 - 1);
    }
}
