//! ZIP archive decoding, sequential and selective.
//!
//! ## Architecture
//!
//! - [`structures`]: record types and the [`Record`] union keyed by magic number
//! - [`decoder`]: decoding of local file, central directory and end of central
//!   directory records from a [`ByteCursor`](crate::io::ByteCursor)
//! - [`locator`]: backward chunked search for the end of central directory
//! - [`central`]: lazy stream of central directory records
//! - [`partition`]: grouping of nearby entries into single range fetches
//! - [`fetcher`]: concurrency-capped range requests
//! - [`pipeline`]: selective extraction ([`RemoteArchive`])
//! - [`sequential`]: whole-archive decoding from a forward-only stream
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The sequential path reads (1) front to back. The selective path reads
//! (3), then (2), then only the parts of (1) it was asked for.
//!
//! ## Limitations
//!
//! - STORED and DEFLATE only; other methods decode to [`Body::Unavailable`]
//! - No ZIP64, encryption, or multi-disk archives
//! - Data descriptors are not followed in the sequential path

pub mod central;
pub mod decoder;
pub mod fetcher;
pub mod locator;
pub mod partition;
pub mod pipeline;
pub mod sequential;
mod structures;

pub use central::CentralDirectoryStream;
pub use fetcher::{BoundedFetcher, FetchGate, FetchTicket};
pub use locator::{CentralDirectoryRegion, locate_central_directory};
pub use partition::{Partition, Partitioner, partition_records};
pub use pipeline::{ExtractedEntries, RemoteArchive};
pub use sequential::ZipStreamReader;
pub use structures::*;
