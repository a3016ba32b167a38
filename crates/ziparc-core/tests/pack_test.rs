use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;
use ziparc_core::{
    create_archive, CancellationToken, EntryNaming, ErrorKind, NoProgress, PackOptions,
    ProgressEvent, ProgressSink,
};
use ziparc_testing::assertions::{read_zip_entry, zip_entry_names};
use ziparc_testing::fixtures::create_pack_tree;
use ziparc_testing::TestDir;

#[derive(Default)]
struct Recorder(Mutex<Vec<ProgressEvent>>);

impl ProgressSink for Recorder {
    fn on_progress(&self, event: &ProgressEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Recorder {
    fn fractions(&self) -> Vec<f64> {
        self.0.lock().unwrap().iter().map(|e| e.fraction).collect()
    }
}

fn base_name_options(include_folders: bool) -> PackOptions {
    PackOptions {
        include_folders,
        naming: EntryNaming::BaseName,
        ..Default::default()
    }
}

#[test]
fn test_pack_single_file() {
    let test_dir = TestDir::new().unwrap();
    let source = test_dir.create_file("report.txt", b"Test content for ZIP").unwrap();
    let archive = test_dir.join("out/report.zip");

    let result = create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();

    assert_eq!(result, archive);
    assert_eq!(zip_entry_names(&archive).unwrap(), vec!["report.txt"]);
    assert_eq!(
        read_zip_entry(&archive, "report.txt").unwrap(),
        b"Test content for ZIP"
    );
}

#[test]
fn test_pack_tree_base_names_with_folders() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    let archive = test_dir.join("tree.zip");

    create_archive(
        &test_dir.join("src"),
        &archive,
        &base_name_options(true),
        &NoProgress,
    )
    .unwrap();

    assert_eq!(
        zip_entry_names(&archive).unwrap(),
        vec!["sub/", "y.txt", "x.txt"]
    );
    assert!(read_zip_entry(&archive, "sub/").unwrap().is_empty());
    assert_eq!(read_zip_entry(&archive, "y.txt").unwrap(), b"yy");
    assert_eq!(read_zip_entry(&archive, "x.txt").unwrap(), b"x");
}

#[test]
fn test_pack_flattened_duplicate_names() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_file("src/a/x.txt", b"from a").unwrap();
    test_dir.create_file("src/b/x.txt", b"from b").unwrap();
    let archive = test_dir.join("flat.zip");

    create_archive(
        &test_dir.join("src"),
        &archive,
        &base_name_options(false),
        &NoProgress,
    )
    .unwrap();

    assert_eq!(
        zip_entry_names(&archive).unwrap(),
        vec!["x.txt", "x (2).txt"]
    );
    assert_eq!(read_zip_entry(&archive, "x.txt").unwrap(), b"from a");
    assert_eq!(read_zip_entry(&archive, "x (2).txt").unwrap(), b"from b");
}

#[test]
fn test_pack_tree_without_folders() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    let archive = test_dir.join("tree.zip");

    create_archive(
        &test_dir.join("src"),
        &archive,
        &base_name_options(false),
        &NoProgress,
    )
    .unwrap();

    let names = zip_entry_names(&archive).unwrap();
    assert_eq!(names, vec!["y.txt", "x.txt"]);
    assert!(names.iter().all(|name| !name.ends_with('/')));
}

#[test]
fn test_pack_tree_relative_names() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    let archive = test_dir.join("tree.zip");

    create_archive(
        &test_dir.join("src"),
        &archive,
        &PackOptions::default(),
        &NoProgress,
    )
    .unwrap();

    assert_eq!(
        zip_entry_names(&archive).unwrap(),
        vec!["sub/", "sub/y.txt", "x.txt"]
    );
}

#[test]
fn test_pack_replaces_existing_destination() {
    let test_dir = TestDir::new().unwrap();
    let source = test_dir.create_file("a.txt", b"a").unwrap();
    let archive = test_dir.create_file("a.zip", b"definitely not a zip").unwrap();

    create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();
    assert_eq!(zip_entry_names(&archive).unwrap(), vec!["a.txt"]);
}

#[test]
fn test_pack_destination_inside_source() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    let source = test_dir.join("src");
    let archive = source.join("self.zip");

    create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();
    // Second run sees the first archive while walking
    create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();

    let names = zip_entry_names(&archive).unwrap();
    assert!(!names.iter().any(|name| name.contains("self.zip")));
    assert!(!names.iter().any(|name| name.contains(".ziparc-")));
    assert_eq!(names, vec!["sub/", "sub/y.txt", "x.txt"]);
}

#[test]
fn test_pack_progress_lifecycle() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    let archive = test_dir.join("tree.zip");

    let recorder = Recorder::default();
    create_archive(
        &test_dir.join("src"),
        &archive,
        &PackOptions::default(),
        &recorder,
    )
    .unwrap();

    let fractions = recorder.fractions();
    assert_eq!(fractions.first(), Some(&0.0));
    assert_eq!(fractions.last(), Some(&1.0));
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert!(fractions.contains(&(1.0 / 3.0)));

    let events = recorder.0.lock().unwrap();
    assert!(events.iter().all(|e| e.label == archive.display().to_string()));
}

#[test]
fn test_pack_empty_inputs_progress() {
    let test_dir = TestDir::new().unwrap();
    test_dir.create_dir("empty").unwrap();
    let empty_file = test_dir.create_file("zero.bin", b"").unwrap();

    let recorder = Recorder::default();
    create_archive(
        &test_dir.join("empty"),
        &test_dir.join("empty.zip"),
        &PackOptions::default(),
        &recorder,
    )
    .unwrap();
    assert_eq!(recorder.fractions(), vec![0.0, 1.0]);
    assert!(zip_entry_names(&test_dir.join("empty.zip")).unwrap().is_empty());

    let recorder = Recorder::default();
    create_archive(
        &empty_file,
        &test_dir.join("zero.zip"),
        &PackOptions::default(),
        &recorder,
    )
    .unwrap();
    let fractions = recorder.fractions();
    assert_eq!(fractions.first(), Some(&0.0));
    assert_eq!(fractions.last(), Some(&1.0));
    assert!(fractions.iter().all(|f| f.is_finite()));
    assert!(read_zip_entry(&test_dir.join("zero.zip"), "zero.bin")
        .unwrap()
        .is_empty());
}

#[test]
fn test_pack_missing_source() {
    let test_dir = TestDir::new().unwrap();
    let archive = test_dir.join("missing.zip");

    let recorder = Recorder::default();
    let err = create_archive(
        &test_dir.join("nope"),
        &archive,
        &PackOptions::default(),
        &recorder,
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().starts_with("Couldn't zip"));
    assert!(!archive.exists());
    assert!(recorder.fractions().is_empty());
}

#[test]
fn test_cancelled_pack_leaves_nothing_behind() {
    let test_dir = TestDir::new().unwrap();
    create_pack_tree(&test_dir, "src").unwrap();
    test_dir.create_dir("out").unwrap();
    let archive = test_dir.join("out/tree.zip");

    let token = CancellationToken::new();
    token.cancel();
    let options = PackOptions {
        cancel: Some(token),
        ..Default::default()
    };
    let recorder = Recorder::default();

    let err = create_archive(&test_dir.join("src"), &archive, &options, &recorder).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!archive.exists());
    assert_eq!(fs::read_dir(test_dir.join("out")).unwrap().count(), 0);
    assert_eq!(recorder.fractions(), vec![0.0, 0.0]);
}

#[test]
fn test_destination_directory_is_rejected() {
    let test_dir = TestDir::new().unwrap();
    let source = test_dir.create_file("a.txt", b"a").unwrap();
    let dest = test_dir.create_dir("taken.zip").unwrap();

    let recorder = Recorder::default();
    let err = create_archive(&source, &dest, &PackOptions::default(), &recorder).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(dest.is_dir());
    assert_eq!(recorder.fractions(), vec![0.0]);
}

#[test]
fn test_compression_levels() {
    let test_dir = TestDir::new().unwrap();
    let content = "compressible ".repeat(10_000);
    let source = test_dir.create_file("big.txt", content.as_bytes()).unwrap();

    for level in [1, 9] {
        let archive = test_dir.join(&format!("level{}.zip", level));
        let options = PackOptions {
            compression_level: Some(level),
            ..Default::default()
        };
        create_archive(&source, &archive, &options, &NoProgress).unwrap();
        assert_eq!(
            read_zip_entry(&archive, "big.txt").unwrap(),
            content.as_bytes()
        );
    }
}

#[cfg(unix)]
#[test]
fn test_symlinks_skipped_unless_followed() {
    use ziparc_testing::fixtures::create_symlink_structure;

    let test_dir = TestDir::new().unwrap();
    create_symlink_structure(&test_dir, "src").unwrap();
    let archive = test_dir.join("links.zip");

    create_archive(
        &test_dir.join("src"),
        &archive,
        &PackOptions::default(),
        &NoProgress,
    )
    .unwrap();
    assert_eq!(zip_entry_names(&archive).unwrap(), vec!["file1.txt"]);

    let options = PackOptions {
        follow_symlinks: true,
        ..Default::default()
    };
    create_archive(&test_dir.join("src"), &archive, &options, &NoProgress).unwrap();
    assert_eq!(
        zip_entry_names(&archive).unwrap(),
        vec!["file1.txt", "link_to_file1.txt"]
    );
    assert_eq!(
        read_zip_entry(&archive, "link_to_file1.txt").unwrap(),
        b"Original file"
    );
}

#[cfg(unix)]
#[test]
fn test_unix_permissions_recorded() {
    use std::os::unix::fs::PermissionsExt;

    let test_dir = TestDir::new().unwrap();
    let source = test_dir.create_file("run.sh", b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&source, fs::Permissions::from_mode(0o755)).unwrap();
    let archive = test_dir.join("run.zip");

    create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();

    let mut zip = zip::ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
    let entry = zip.by_name("run.sh").unwrap();
    assert_eq!(entry.unix_mode().map(|mode| mode & 0o777), Some(0o755));
}
