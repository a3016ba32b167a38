//! Resolving a pack input into an ordered list of entries

use super::EntryNaming;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A filesystem object scheduled for packing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Name stored in the archive (`/`-separated, no trailing slash)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
    /// File length in bytes, 0 for directories
    pub len: u64,
}

/// Resolve `input` to the entries to pack.
///
/// A file yields itself, named by its base name. A directory is walked
/// depth first with siblings in file-name order; each subdirectory comes
/// before its contents and is only included when `include_folders` is set.
pub fn collect_sources(
    input: &Path,
    include_folders: bool,
    naming: EntryNaming,
    follow_symlinks: bool,
) -> Result<Vec<SourceEntry>> {
    if !input.exists() {
        return Err(Error::NotFound(input.to_path_buf()));
    }
    let root = absolute(input)?;

    if !root.is_dir() {
        let len = root.metadata()?.len();
        return Ok(vec![SourceEntry {
            name: base_name(&root),
            path: root,
            is_dir: false,
            len,
        }]);
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(1)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
    {
        let entry = entry?;
        let file_type = entry.file_type();
        let path = entry.path();

        if file_type.is_symlink() {
            warn!("ZIP format does not support symlinks, skipping: {:?}", path);
            continue;
        }
        if file_type.is_dir() && !include_folders {
            continue;
        }
        if !file_type.is_dir() && !file_type.is_file() {
            debug!("Skipping special file: {:?}", path);
            continue;
        }

        let name = match naming {
            EntryNaming::BaseName => base_name(path),
            EntryNaming::Relative => relative_name(&root, path),
        };
        let len = if file_type.is_dir() {
            0
        } else {
            entry.metadata()?.len()
        };

        sources.push(SourceEntry {
            path: path.to_path_buf(),
            name,
            is_dir: file_type.is_dir(),
            len,
        });
    }

    if naming == EntryNaming::BaseName {
        disambiguate_names(&mut sources);
    }

    Ok(sources)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rename flattened entries whose name is already taken, `x.txt` becoming
/// `x (2).txt`, `x (3).txt`, ... Directories and files live in separate
/// namespaces since directory entries carry a trailing `/`.
fn disambiguate_names(sources: &mut [SourceEntry]) {
    let mut taken: HashSet<(String, bool)> = sources
        .iter()
        .map(|s| (s.name.clone(), s.is_dir))
        .collect();
    let mut seen = HashSet::new();

    for source in sources.iter_mut() {
        if seen.insert((source.name.clone(), source.is_dir)) {
            continue;
        }
        let (stem, extension) = split_extension(&source.name, source.is_dir);
        let renamed = (2..)
            .map(|n| format!("{} ({}){}", stem, n, extension))
            .find(|candidate| !taken.contains(&(candidate.clone(), source.is_dir)))
            .unwrap_or_else(|| source.name.clone());

        warn!(
            "Flattened entry name {:?} is used more than once, storing {:?} as {:?}",
            source.name, source.path, renamed
        );
        taken.insert((renamed.clone(), source.is_dir));
        seen.insert((renamed.clone(), source.is_dir));
        source.name = renamed;
    }
}

fn split_extension(name: &str, is_dir: bool) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if !is_dir && dot > 0 => name.split_at(dot),
        _ => (name, ""),
    }
}
