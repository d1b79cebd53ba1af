use thiserror::Error;

/// Errors produced while locating, fetching, or decoding ZIP records.
#[derive(Error, Debug)]
pub enum ZipError {
    #[error("central directory not found")]
    CentralDirectoryNotFound,

    #[error("end of central directory record at offset {offset} is truncated")]
    TruncatedEndOfCentralDirectory { offset: u64 },

    #[error("central directory offset {cd_offset} lies beyond its trailer at {eocd_offset}")]
    InvalidCentralDirectoryOffset { cd_offset: u64, eocd_offset: u64 },

    #[error("unexpected end of data: needed {needed} bytes, got {got}")]
    UnexpectedEof { needed: usize, got: usize },

    #[error("unexpected signature {found:#010x}, expected {expected}")]
    UnexpectedSignature { expected: &'static str, found: u32 },

    #[error("body of {name} is unavailable: {reason}")]
    BodyUnavailable { name: String, reason: String },

    #[error("content of {name} is not valid UTF-8")]
    InvalidText {
        name: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("remote server does not support Range requests")]
    RangeNotSupported,

    #[error("remote server did not return Content-Length")]
    MissingContentLength,

    #[error("HTTP request failed with status: {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("range {start}-{end} is outside a source of {length} bytes")]
    InvalidRange { start: u64, end: u64, length: u64 },

    #[error("fetch task aborted: {0}")]
    FetchAborted(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ZipError> = std::result::Result<T, E>;
