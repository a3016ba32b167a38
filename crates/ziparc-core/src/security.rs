//! Path containment for extracted entries

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::{error, warn};

/// Join an untrusted entry name onto `base`, rejecting names that could
/// leave `base`.
pub fn sanitize_path(base: &Path, untrusted: &str) -> Result<PathBuf> {
    let mut result = base.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(untrusted).components() {
        match component {
            Component::Normal(name) => {
                result.push(name);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                error!(path = %untrusted, "Entry name contains parent directory component");
                return Err(Error::PathTraversal(format!(
                    "parent directory component in {:?}",
                    untrusted
                )));
            }
            Component::RootDir => {
                error!(path = %untrusted, "Entry name is absolute");
                return Err(Error::PathTraversal(format!(
                    "absolute entry name {:?}",
                    untrusted
                )));
            }
            Component::Prefix(_) => {
                error!(path = %untrusted, "Entry name contains a drive prefix");
                return Err(Error::PathTraversal(format!(
                    "drive prefix in {:?}",
                    untrusted
                )));
            }
        }
    }

    if depth == 0 {
        return Err(Error::MalformedArchive(format!(
            "entry name {:?} has no path components",
            untrusted
        )));
    }

    Ok(result)
}

/// Resolve where an entry is written.
///
/// With `allow_escape` the name is joined as-is (a leading `/` is treated
/// as relative to `base`), so `..` segments may land outside `base`.
pub fn resolve_entry_path(base: &Path, name: &str, allow_escape: bool) -> Result<PathBuf> {
    if !allow_escape {
        return sanitize_path(base, name);
    }

    let relative = name.trim_start_matches('/');
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        warn!(path = %name, "Writing entry that may escape the destination");
    }
    Ok(base.join(relative))
}
