//! Common assertions for ziparc testing

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Asserts that two directory structures are identical
pub fn assert_dirs_equal(dir1: &Path, dir2: &Path) -> Result<()> {
    let entries1 = collect_entries(dir1)?;
    let entries2 = collect_entries(dir2)?;

    assert_eq!(
        entries1.iter().map(|(rel, _)| rel).collect::<Vec<_>>(),
        entries2.iter().map(|(rel, _)| rel).collect::<Vec<_>>(),
        "Different entries in {:?} and {:?}",
        dir1,
        dir2
    );

    for ((rel, path1), (_, path2)) in entries1.iter().zip(entries2.iter()) {
        let meta1 = std::fs::metadata(path1)?;
        let meta2 = std::fs::metadata(path2)?;

        assert_eq!(meta1.is_file(), meta2.is_file(), "File type mismatch for {:?}", rel);

        if meta1.is_file() {
            assert_eq!(
                std::fs::read(path1)?,
                std::fs::read(path2)?,
                "Content mismatch for {:?}",
                rel
            );
        }
    }

    Ok(())
}

/// Asserts that `path` is a file holding exactly `expected`
pub fn assert_file_content(path: &Path, expected: &[u8]) -> Result<()> {
    let content = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
    assert_eq!(content, expected, "Content mismatch for {:?}", path);
    Ok(())
}

/// Asserts that a file has specific permissions (Unix only)
#[cfg(unix)]
pub fn assert_file_permissions(path: &Path, expected: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    assert_eq!(
        mode, expected,
        "Permission mismatch for {:?}: expected {:o}, got {:o}",
        path, expected, mode
    );
    Ok(())
}

/// Relative `/`-separated paths of every file below `dir`, sorted
pub fn collect_files(dir: &Path) -> Result<Vec<String>> {
    Ok(collect_entries(dir)?
        .into_iter()
        .filter(|(_, path)| path.is_file())
        .map(|(rel, _)| rel)
        .collect())
}

/// Entry names of a ZIP archive in central directory order
pub fn zip_entry_names(archive: &Path) -> Result<Vec<String>> {
    let mut archive = zip::ZipArchive::new(File::open(archive)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        names.push(archive.by_index_raw(index)?.name().to_string());
    }
    Ok(names)
}

/// Decompressed content of one ZIP entry
pub fn read_zip_entry(archive: &Path, name: &str) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(File::open(archive)?)?;
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("entry {:?} not in archive", name))?;
    let mut content = Vec::new();
    entry.read_to_end(&mut content)?;
    Ok(content)
}

fn collect_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(dir)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((rel, entry.path().to_path_buf()));
    }
    entries.sort();
    Ok(entries)
}
