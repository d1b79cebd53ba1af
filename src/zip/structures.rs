use crate::error::{Result, ZipError};

pub const LOCAL_FILE_SIGNATURE: u32 = 0x04034b50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Outcome of decoding a file body.
///
/// The compressed window is always consumed; when it cannot be turned into
/// content the reason is kept instead of an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Available(Vec<u8>),
    Unavailable(String),
}

/// Local file header - 30 bytes plus name, extra field and body
#[derive(Debug, Clone)]
pub struct LocalFileRecord {
    pub signature: u32,
    pub version: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub file_name: String,
    pub extra_field_length: u16,
    pub extra: Vec<u8>,
    pub is_directory: bool,
    pub body: Body,
}

impl LocalFileRecord {
    pub const FIXED_SIZE: usize = 30;
}

/// Central directory file header - 46 bytes plus name, extra field and comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryRecord {
    pub signature: u32,
    pub version_created: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub file_name: String,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
    pub is_directory: bool,
    /// Absolute offset of the matching local file header
    pub first_byte_at: u64,
    /// Absolute offset of the last byte of the local file body
    pub last_byte_at: u64,
}

impl CentralDirectoryRecord {
    pub const FIXED_SIZE: usize = 46;

    /// Last byte of the local record, assuming it repeats this record's
    /// name and extra lengths.
    pub fn compute_last_byte_at(&self) -> u64 {
        self.first_byte_at
            + LocalFileRecord::FIXED_SIZE as u64
            + self.file_name_length as u64
            + self.extra_field_length as u64
            + self.file_comment_length as u64
            + self.compressed_size as u64
            - 1
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        dos_date(self.last_mod_date)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        dos_time(self.last_mod_time)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectoryRecord {
    pub signature: u32,
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectoryRecord {
    pub const FIXED_SIZE: usize = 22;
}

/// Every record shape a decoder can encounter, keyed by its magic number.
#[derive(Debug, Clone)]
pub enum Record {
    LocalFile(LocalFileRecord),
    CentralDirectory(CentralDirectoryRecord),
    EndOfCentralDirectory(EndOfCentralDirectoryRecord),
    /// A signature outside the three known shapes
    Unrecognized(u32),
    /// The source ended cleanly before another signature
    Exhausted,
}

/// Should this central directory entry be extracted?
pub type Predicate = dyn Fn(&CentralDirectoryRecord) -> bool + Send + Sync;

/// Skip directory entries that carry no data; keep everything else.
pub fn default_predicate(record: &CentralDirectoryRecord) -> bool {
    !(record.is_directory && record.uncompressed_size == 0)
}

/// A file produced by either reading path
#[derive(Debug, Clone)]
pub struct ZipEntry {
    record: LocalFileRecord,
}

impl ZipEntry {
    pub fn name(&self) -> &str {
        &self.record.file_name
    }

    pub fn is_directory(&self) -> bool {
        self.record.is_directory
    }

    pub fn record(&self) -> &LocalFileRecord {
        &self.record
    }

    pub fn body(&self) -> &Body {
        &self.record.body
    }

    /// Decompressed content
    pub fn bytes(&self) -> Result<&[u8]> {
        match &self.record.body {
            Body::Available(data) => Ok(data),
            Body::Unavailable(reason) => Err(ZipError::BodyUnavailable {
                name: self.record.file_name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Decompressed content decoded as UTF-8
    pub fn text(&self) -> Result<String> {
        let bytes = self.bytes()?.to_vec();
        String::from_utf8(bytes).map_err(|source| ZipError::InvalidText {
            name: self.record.file_name.clone(),
            source,
        })
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self.record.body {
            Body::Available(data) => Ok(data),
            Body::Unavailable(reason) => Err(ZipError::BodyUnavailable {
                name: self.record.file_name,
                reason,
            }),
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        dos_date(self.record.last_mod_date)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        dos_time(self.record.last_mod_time)
    }
}

impl From<LocalFileRecord> for ZipEntry {
    fn from(record: LocalFileRecord) -> Self {
        Self { record }
    }
}

fn dos_date(date: u16) -> (u16, u8, u8) {
    let day = (date & 0x1F) as u8;
    let month = ((date >> 5) & 0x0F) as u8;
    let year = ((date >> 9) & 0x7F) + 1980;
    (year, month, day)
}

fn dos_time(time: u16) -> (u8, u8, u8) {
    let second = ((time & 0x1F) * 2) as u8;
    let minute = ((time >> 5) & 0x3F) as u8;
    let hour = ((time >> 11) & 0x1F) as u8;
    (hour, minute, second)
}
