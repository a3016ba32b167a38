//! Common test fixtures for ziparc testing

use crate::TestDir;
use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Creates the small tree used by most pack tests:
///
/// ```text
/// x.txt
/// sub/
/// sub/y.txt
/// ```
pub fn create_pack_tree(test_dir: &TestDir, root: &str) -> Result<()> {
    test_dir.create_file(&format!("{}/x.txt", root), b"x")?;
    test_dir.create_file(&format!("{}/sub/y.txt", root), b"yy")?;
    Ok(())
}

/// Creates a larger tree with nesting, an empty file, an empty directory,
/// binary content and a file big enough to span many copy buffers
pub fn create_archive_structure(test_dir: &TestDir, root: &str) -> Result<()> {
    test_dir.create_file(&format!("{}/README.md", root), b"# Test Archive\n\nThis is a test archive.")?;
    test_dir.create_file(&format!("{}/empty.txt", root), b"")?;
    test_dir.create_file(&format!("{}/image.jpg", root), &[0xFF, 0xD8, 0xFF, 0xE0])?;
    test_dir.create_file(&format!("{}/src/main.rs", root), b"fn main() {}")?;
    test_dir.create_file(&format!("{}/src/modules/mod.rs", root), b"pub mod utils;")?;
    test_dir.create_dir(&format!("{}/assets/empty", root))?;

    let large_content = "ziparc streaming test line\n".repeat(40 * 1024);
    test_dir.create_file(&format!("{}/logs/large.log", root), large_content.as_bytes())?;
    Ok(())
}

/// Creates a symlink beside a regular file (Unix only)
#[cfg(unix)]
pub fn create_symlink_structure(test_dir: &TestDir, root: &str) -> Result<()> {
    use std::os::unix::fs::symlink;

    let target = test_dir.create_file(&format!("{}/file1.txt", root), b"Original file")?;
    symlink(&target, test_dir.join(&format!("{}/link_to_file1.txt", root)))?;
    Ok(())
}

/// Writes a conventional (non-streamed) archive with the `zip` crate.
///
/// Names ending in `/` become directory entries; everything else is a
/// deflated file.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);

    for (name, content) in entries {
        let options =
            FileOptions::<'static, ()>::default().compression_method(CompressionMethod::Deflated);
        if name.ends_with('/') {
            zip.add_directory(*name, options)?;
        } else {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())?;
        }
    }
    zip.finish()?;
    Ok(())
}
