//! ZIP archive creation from a file or directory tree

use super::sources::{collect_sources, SourceEntry};
use super::{check_cancelled, PackOptions};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default copy buffer for file contents
pub const DEFAULT_COPY_BUFFER: usize = 4 * 1024;

/// Pack `source` (a file or a directory) into a ZIP archive at
/// `destination`, replacing any existing file there.
///
/// The archive is written to a temporary file next to `destination` and
/// moved into place once complete, so a failed run leaves nothing behind.
/// Returns `destination` on success.
pub fn create_archive(
    source: &Path,
    destination: &Path,
    options: &PackOptions,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    info!("Packing {:?} into ZIP {:?}", source, destination);

    let sources = collect_sources(
        source,
        options.include_folders,
        options.naming,
        options.follow_symlinks,
    )
    .map_err(|e| {
        error!("Couldn't open file/directory {:?}: {}", source, e);
        Error::pack(destination, e)
    })?;

    let mut reporter = ProgressReporter::new(progress, destination.display().to_string());
    match write_archive(&sources, destination, options, &mut reporter) {
        Ok(count) => {
            reporter.finish();
            info!("Packed {} entries into {:?}", count, destination);
            Ok(destination.to_path_buf())
        }
        Err(e) => {
            error!("Packing {:?} failed: {}", destination, e);
            reporter.abandon();
            Err(Error::pack(destination, e))
        }
    }
}

fn write_archive(
    sources: &[SourceEntry],
    destination: &Path,
    options: &PackOptions,
    reporter: &mut ProgressReporter<'_>,
) -> Result<usize> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            parent.to_path_buf()
        }
        _ => PathBuf::from("."),
    };

    if destination.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination {:?} is a directory", destination),
        )));
    }
    if destination.exists() {
        debug!("Removing existing archive: {:?}", destination);
        fs::remove_file(destination)?;
    }

    // The destination may live inside the tree being packed.
    let destination_abs = if destination.is_absolute() {
        destination.to_path_buf()
    } else {
        std::env::current_dir()?.join(destination)
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".ziparc-")
        .suffix(".tmp")
        .tempfile_in(&parent)?;

    reporter.start();

    let mut written = 0;
    {
        let mut zip = ZipWriter::new(BufWriter::new(temp.as_file_mut()));
        let mut buffer = vec![0u8; options.buffer_size.max(1)];
        let total = sources.len() as u64;

        for (index, source) in sources.iter().enumerate() {
            check_cancelled(&options.cancel)?;

            if source.path == destination_abs {
                debug!("Skipping the archive being written: {:?}", source.path);
                continue;
            }

            if source.is_dir {
                add_directory(&mut zip, source)?;
            } else {
                add_file(&mut zip, source, options, &mut buffer)?;
            }
            written += 1;
            reporter.report(index as u64 + 1, total);
        }

        let writer = zip.finish()?;
        writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    }

    temp.persist(destination).map_err(|e| Error::Io(e.error))?;
    Ok(written)
}

fn add_directory<W: Write + Seek>(zip: &mut ZipWriter<W>, source: &SourceEntry) -> Result<()> {
    debug!("Adding directory to ZIP: {}/", source.name);

    let options =
        FileOptions::<'static, ()>::default().compression_method(CompressionMethod::Stored);

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        match fs::metadata(&source.path) {
            Ok(metadata) => options.unix_permissions(metadata.permissions().mode()),
            Err(_) => options,
        }
    };

    zip.add_directory(source.name.as_str(), options)?;
    Ok(())
}

fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    source: &SourceEntry,
    options: &PackOptions,
    buffer: &mut [u8],
) -> Result<()> {
    debug!("Adding file to ZIP: {:?} as {}", source.path, source.name);

    let mut file = File::open(&source.path)?;
    let metadata = file.metadata()?;

    let file_options = FileOptions::<'static, ()>::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(options.compression_level)
        .large_file(metadata.len() >= u32::MAX as u64);

    #[cfg(unix)]
    let file_options = {
        use std::os::unix::fs::PermissionsExt;
        file_options.unix_permissions(metadata.permissions().mode())
    };

    zip.start_file(source.name.as_str(), file_options)?;
    loop {
        let n = match file.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        zip.write_all(&buffer[..n])?;
    }
    Ok(())
}
