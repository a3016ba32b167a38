//! ziparc - streaming ZIP extraction and packing
//!
//! This library extracts ZIP archives from any byte stream (including
//! archives whose entry sizes live in trailing data descriptors) and packs
//! files or directory trees into ZIP archives, reporting progress to a
//! caller-supplied sink.

pub mod archive;
pub mod assets;
pub mod config;
pub mod error;
pub mod progress;
pub mod security;

pub use error::{Error, ErrorKind, Result};

// Re-export commonly used types
pub use archive::{
    collect_sources, create_archive, extract_archive, extract_asset, extract_stream,
    list_entries, ArchiveEntry, EntryNaming, ExtractOptions, ExtractSummary, PackOptions,
    SourceEntry,
};
pub use progress::{CancellationToken, NoProgress, ProgressEvent, ProgressSink};
