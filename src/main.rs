//! Main entry point for the zipfetch CLI application.
//!
//! This binary extracts ZIP files from both the local filesystem and remote
//! HTTP URLs, fetching only the byte ranges of the selected entries.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use zipfetch::{
    ByteSource, Cli, HttpRangeReader, LocalFileReader, RemoteArchive, ZipEntry, ZipStreamReader,
    default_predicate,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Arc::new(Cli::parse());

    if cli.is_http_url() {
        let reader = HttpRangeReader::new(cli.file.clone())
            .await?
            .with_max_retry(cli.max_retry);
        let reader = Arc::new(reader);
        let transferred_before = reader.transferred_bytes();

        process_zip(reader.clone(), cli.clone()).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            let transferred = reader.transferred_bytes() - transferred_before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.file)).await?);
        process_zip(reader, cli).await?;
    }

    Ok(())
}

/// List or extract, depending on the CLI options.
async fn process_zip<S: ByteSource + 'static>(source: Arc<S>, cli: Arc<Cli>) -> Result<()> {
    if cli.sequential {
        return extract_sequential(source, &cli).await;
    }

    let archive = RemoteArchive::with_options(source, cli.reader_options());

    if cli.list || cli.verbose {
        return list_files(&archive, cli.verbose).await;
    }

    // Directories are created on demand while writing files.
    let selection = Arc::clone(&cli);
    let mut entries = archive.extract(move |record| {
        default_predicate(record) && !record.is_directory && selection.selects(&record.file_name)
    });

    let mut count = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        write_entry(&entry, &cli, count > 0).await?;
        count += 1;
    }

    if count == 0 && !cli.is_very_quiet() {
        eprintln!("caution: no files matched");
    }
    Ok(())
}

/// Read the whole archive front to back with one request.
async fn extract_sequential<S: ByteSource + 'static>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let length = source.length();
    if length == 0 {
        anyhow::bail!("Empty archive");
    }
    let stream = source.stream_bytes(0, length - 1).await?;
    let mut reader = ZipStreamReader::new(stream);

    let mut count = 0usize;
    while let Some(entry) = reader.next_entry().await? {
        if entry.is_directory() || !cli.selects(entry.name()) {
            continue;
        }
        if cli.list || cli.verbose {
            println!("{}", entry.name());
        } else {
            write_entry(&entry, cli, count > 0).await?;
        }
        count += 1;
    }
    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
async fn list_files<S: ByteSource + 'static>(archive: &RemoteArchive<S>, verbose: bool) -> Result<()> {
    let records = archive.list().await?;

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for record in &records {
        if !verbose {
            println!("{}", record.file_name);
            continue;
        }

        let (year, month, day) = record.mod_date();
        let (hour, minute, _second) = record.mod_time();
        let uncompressed = record.uncompressed_size as u64;
        let compressed = record.compressed_size as u64;

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            uncompressed,
            compressed,
            ratio(compressed, uncompressed),
            year,
            month,
            day,
            hour,
            minute,
            record.file_name
        );

        if !record.is_directory {
            total_uncompressed += uncompressed;
            total_compressed += compressed;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Compression ratio as percentage saved
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100i64 - (compressed * 100 / uncompressed) as i64
        )
    } else {
        "  0%".to_string()
    }
}

/// Write one extracted entry to stdout or disk, honoring the CLI options.
///
/// In pipe mode with several files, each file after the first is preceded by
/// a name marker.
async fn write_entry(entry: &ZipEntry, cli: &Cli, show_filename: bool) -> Result<()> {
    let data = entry.bytes()?;

    if cli.pipe {
        let mut stdout = tokio::io::stdout();
        if show_filename {
            stdout
                .write_all(format!("--- {} ---\n", entry.name()).as_bytes())
                .await?;
        }
        stdout.write_all(data).await?;
        return Ok(());
    }

    let Some(output_path) = cli.output_path(entry.name()) else {
        tracing::warn!(name = entry.name(), "refusing to write outside the extraction directory");
        if !cli.is_quiet() {
            eprintln!("Skipping: {} (unsafe path)", entry.name());
        }
        return Ok(());
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.name());
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.name());
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.name());
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut file = tokio::fs::File::create(&output_path).await?;
    file.write_all(data).await?;

    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
