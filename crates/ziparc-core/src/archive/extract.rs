//! Streaming extraction to a directory tree

use super::stream::ZipStreamReader;
use super::{check_cancelled, ArchiveEntry, ExtractOptions};
use crate::assets::AssetSource;
use crate::progress::{ProgressReporter, ProgressSink};
use crate::security::resolve_entry_path;
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Counts gathered during one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Entries seen in the stream, directories included
    pub entries: usize,
    /// Files written
    pub files: usize,
    /// Directories created from directory entries
    pub directories: usize,
    /// Decompressed bytes written
    pub bytes_written: u64,
}

/// Extract the ZIP archive at `archive` into `destination`.
///
/// The file length scales progress. Returns `destination` on success.
pub fn extract_archive(
    archive: &Path,
    destination: &Path,
    options: &ExtractOptions,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let label = archive.display().to_string();
    let file = File::open(archive).map_err(|source| {
        Error::extraction(
            label.clone(),
            Error::Open {
                target: label.clone(),
                source,
            },
        )
    })?;
    let total = file.metadata().map(|m| m.len()).unwrap_or(0);

    extract_stream(file, total, &label, destination, options, progress)?;
    Ok(destination.to_path_buf())
}

/// Extract a ZIP archive shipped as a packaged asset.
///
/// Returns `destination` on success.
pub fn extract_asset(
    assets: &dyn AssetSource,
    asset_id: &str,
    destination: &Path,
    options: &ExtractOptions,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let asset = assets.open(asset_id).map_err(|source| {
        Error::extraction(
            asset_id,
            Error::Open {
                target: format!("asset `{}`", asset_id),
                source,
            },
        )
    })?;

    extract_stream(
        asset.reader,
        asset.len,
        asset_id,
        destination,
        options,
        progress,
    )?;
    Ok(destination.to_path_buf())
}

/// Extract every entry of a ZIP byte stream into `destination`.
///
/// `total_hint` is the expected stream length and only scales progress.
/// `label` names the archive in progress events and errors.
pub fn extract_stream<R: Read>(
    reader: R,
    total_hint: u64,
    label: &str,
    destination: &Path,
    options: &ExtractOptions,
    progress: &dyn ProgressSink,
) -> Result<ExtractSummary> {
    info!("Extracting ZIP {} to {:?}", label, destination);

    let mut reporter = ProgressReporter::new(progress, label);
    reporter.start();

    let summary = extract_entries(reader, total_hint, destination, options, &mut reporter)
        .map_err(|e| {
            error!("Extraction of {} failed: {}", label, e);
            Error::extraction(label, e)
        })?;

    reporter.finish();
    info!(
        "Extracted {} files ({} bytes) from {}",
        summary.files, summary.bytes_written, label
    );
    Ok(summary)
}

fn extract_entries<R: Read>(
    reader: R,
    total_hint: u64,
    destination: &Path,
    options: &ExtractOptions,
    reporter: &mut ProgressReporter<'_>,
) -> Result<ExtractSummary> {
    fs::create_dir_all(destination)?;

    let mut zip = ZipStreamReader::with_capacity(options.buffer_size, reader);
    let mut buffer = vec![0u8; options.buffer_size.max(1)];
    let mut summary = ExtractSummary::default();

    while let Some(mut entry) = zip.next_entry()? {
        check_cancelled(&options.cancel)?;
        summary.entries += 1;

        if entry.is_dir() {
            if options.create_directory_entries {
                let path =
                    resolve_entry_path(destination, entry.name(), options.allow_path_escape)?;
                debug!("Creating directory: {:?}", path);
                fs::create_dir_all(&path)?;
                summary.directories += 1;
            } else {
                debug!("Skipping directory entry: {}", entry.name());
            }
            entry.finish()?;
            continue;
        }

        let path = resolve_entry_path(destination, entry.name(), options.allow_path_escape)?;
        debug!("Extracting: {} -> {:?}", entry.name(), path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::with_capacity(buffer.len(), File::create(&path)?);
        loop {
            let n = entry.read_data(&mut buffer)?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
            summary.bytes_written += n as u64;
            reporter.report(entry.stream_position(), total_hint);
        }
        out.flush()?;
        drop(out);

        entry.finish()?;
        summary.files += 1;
    }

    Ok(summary)
}

/// Walk a ZIP byte stream without writing anything.
///
/// Every entry is read and verified, so sizes and CRCs are always set.
pub fn list_entries<R: Read>(reader: R) -> Result<Vec<ArchiveEntry>> {
    let mut zip = ZipStreamReader::new(reader);
    let mut entries = Vec::new();
    while let Some(entry) = zip.next_entry()? {
        entries.push(entry.finish()?);
    }
    Ok(entries)
}
