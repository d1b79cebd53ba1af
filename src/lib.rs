//! # zipfetch
//!
//! A streaming ZIP reader with two ways in:
//!
//! - [`ZipStreamReader`] decodes every file of an archive from a forward-only
//!   byte stream.
//! - [`RemoteArchive`] extracts a chosen subset of files from a randomly
//!   addressable archive (an HTTP URL, a local file, a buffer). It reads the
//!   central directory from the end of the archive, groups the wanted entries
//!   into nearby byte ranges, and fetches each group with one Range request,
//!   a bounded number at a time.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipfetch::{HttpRangeReader, RemoteArchive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//!     let archive = RemoteArchive::new(reader);
//!
//!     let mut entries = archive.extract(|record| record.file_name.ends_with(".php"));
//!     while let Some(entry) = entries.next_entry().await? {
//!         println!("{}", entry.name());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use config::ReaderOptions;
pub use error::{Result, ZipError};
pub use io::{ByteCursor, ByteSource, ByteStream, HttpRangeReader, LocalFileReader, MemorySource};
pub use zip::{
    Body, CentralDirectoryRecord, CompressionMethod, EndOfCentralDirectoryRecord, ExtractedEntries,
    FetchGate, LocalFileRecord, Record, RemoteArchive, ZipEntry, ZipStreamReader,
    default_predicate,
};
