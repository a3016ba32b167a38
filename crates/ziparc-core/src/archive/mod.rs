//! Archive operations module

mod cp437;
pub mod extract;
pub mod pack;
pub mod sources;
pub mod stream;

pub use extract::{
    extract_archive, extract_asset, extract_stream, list_entries, ExtractSummary,
};
pub use pack::create_archive;
pub use sources::{collect_sources, SourceEntry};
pub use stream::{CompressionMethod, ZipStreamEntry, ZipStreamReader};

use crate::config::{ExtractConfig, PackConfig};
use crate::progress::CancellationToken;
use serde::{Deserialize, Serialize};

/// Archive entry information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveEntry {
    /// Path within the archive, `/`-separated, trailing `/` for directories
    pub name: String,
    /// Whether this is a directory marker
    pub is_dir: bool,
    /// Uncompressed size (unknown for streamed entries until read)
    pub size: Option<u64>,
    /// Compressed size (unknown for streamed entries until read)
    pub compressed_size: Option<u64>,
    /// Compression method
    pub method: CompressionMethod,
    /// CRC-32 of the uncompressed data
    pub crc32: Option<u32>,
    /// Whether sizes and CRC follow the data in a data descriptor
    pub streamed: bool,
}

/// How packed entries are named inside the archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryNaming {
    /// Path relative to the packed root
    #[default]
    Relative,
    /// Final path segment only; entries from different directories may
    /// collide
    BaseName,
}

/// Extract options
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Copy buffer and lookahead size in bytes
    pub buffer_size: usize,
    /// Write entries wherever their names resolve, even outside the
    /// destination
    pub allow_path_escape: bool,
    /// Create directories for directory entries instead of skipping them
    pub create_directory_entries: bool,
    /// Checked between entries
    pub cancel: Option<CancellationToken>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: stream::DEFAULT_BUFFER_SIZE,
            allow_path_escape: false,
            create_directory_entries: false,
            cancel: None,
        }
    }
}

impl From<&ExtractConfig> for ExtractOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            buffer_size: config.buffer_size as usize,
            allow_path_escape: config.allow_path_escape,
            create_directory_entries: config.create_directory_entries,
            cancel: None,
        }
    }
}

/// Pack options for archive creation
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Emit entries for directories found while walking
    pub include_folders: bool,
    /// Entry naming scheme
    pub naming: EntryNaming,
    /// Deflate level (0-9); `None` uses the library default
    pub compression_level: Option<i64>,
    /// Follow symlinks (pack link targets instead of skipping links)
    pub follow_symlinks: bool,
    /// Copy buffer size in bytes
    pub buffer_size: usize,
    /// Checked between entries
    pub cancel: Option<CancellationToken>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            include_folders: true,
            naming: EntryNaming::default(),
            compression_level: None,
            follow_symlinks: false,
            buffer_size: pack::DEFAULT_COPY_BUFFER,
            cancel: None,
        }
    }
}

impl From<&PackConfig> for PackOptions {
    fn from(config: &PackConfig) -> Self {
        Self {
            include_folders: config.include_folders,
            naming: config.naming,
            compression_level: config.compression_level,
            follow_symlinks: config.follow_symlinks,
            buffer_size: config.buffer_size as usize,
            cancel: None,
        }
    }
}

pub(crate) fn check_cancelled(cancel: &Option<CancellationToken>) -> crate::Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(crate::Error::Cancelled),
        _ => Ok(()),
    }
}
