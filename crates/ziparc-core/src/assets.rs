//! Packaged asset lookup
//!
//! An application can ship archives inside its own bundle. The extractor
//! reads them through an [`AssetSource`] instead of a filesystem path.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// An opened asset together with its length in bytes
pub struct Asset {
    pub reader: Box<dyn Read + Send>,
    pub len: u64,
}

/// Resolves asset identifiers to byte streams
pub trait AssetSource: Send + Sync {
    /// Open the asset named `id`
    fn open(&self, id: &str) -> io::Result<Asset>;
}

/// Assets stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssets {
    fn open(&self, id: &str) -> io::Result<Asset> {
        let relative = Path::new(id);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("asset id {:?} must be a relative path inside the bundle", id),
            ));
        }

        let file = File::open(self.root.join(relative))?;
        let len = file.metadata()?.len();
        Ok(Asset {
            reader: Box::new(file),
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_assets_open() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("bundles")).unwrap();
        std::fs::write(temp_dir.path().join("bundles/a.zip"), b"12345").unwrap();

        let assets = DirAssets::new(temp_dir.path());
        let mut asset = assets.open("bundles/a.zip").unwrap();
        assert_eq!(asset.len, 5);
        let mut content = String::new();
        asset.reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "12345");
    }

    #[test]
    fn test_dir_assets_rejects_outside_ids() {
        let temp_dir = TempDir::new().unwrap();
        let assets = DirAssets::new(temp_dir.path());
        assert!(assets.open("../secret.zip").is_err());
        assert!(assets.open("/etc/passwd").is_err());
        assert_eq!(
            assets.open("missing.zip").err().map(|e| e.kind()),
            Some(io::ErrorKind::NotFound)
        );
    }
}
