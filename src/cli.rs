use std::path::{Component, Path, PathBuf};

use clap::Parser;

use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_MAX_GAP, ReaderOptions};

#[derive(Parser, Debug)]
#[command(name = "zipfetch")]
#[command(version)]
#[command(about = "Extract selected files from local or remote ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipfetch data1.zip -x joe        extract all files except joe from data1.zip\n  \
  zipfetch -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  zipfetch -l https://example.com/archive.zip   list files from remote ZIP\n  \
  zipfetch https://example.com/wp.zip '*.php' -d out   fetch only PHP files")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Read the whole archive front to back instead of using the central directory
    #[arg(long)]
    pub sequential: bool,

    /// Maximum simultaneous range requests
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Byte gap tolerated between entries fetched in one request
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_GAP, allow_negative_numbers = true)]
    pub max_gap: i64,

    /// Size of each backward read when searching for the central directory
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Attempts made to open each HTTP range before giving up
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub max_retry: u32,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions::default()
            .chunk_size(self.chunk_size)
            .max_gap(self.max_gap)
            .concurrency(self.concurrency)
    }

    /// Does `name` pass the positional file list and the `-x` exclusions?
    pub fn selects(&self, name: &str) -> bool {
        if !self.files.is_empty() {
            let matches = self.files.iter().any(|f| {
                if has_glob_chars(f) {
                    glob_match(f, name)
                } else {
                    let basename = Path::new(name)
                        .file_name()
                        .map(|s| s.to_string_lossy())
                        .unwrap_or_default();
                    name == f || basename == *f
                }
            });
            if !matches {
                return false;
            }
        }

        !self
            .exclude
            .iter()
            .any(|x| name.contains(x.as_str()) || glob_match(x, name))
    }

    /// Where entry `name` is written, or `None` if it would land outside the
    /// extraction directory.
    pub fn output_path(&self, name: &str) -> Option<PathBuf> {
        let relative = if self.junk_paths {
            PathBuf::from(Path::new(name).file_name()?)
        } else {
            PathBuf::from(name)
        };
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || relative.as_os_str().is_empty() {
            return None;
        }
        Some(match self.extract_dir {
            Some(ref dir) => PathBuf::from(dir).join(relative),
            None => relative,
        })
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}
