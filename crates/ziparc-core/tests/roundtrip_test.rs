use std::fs::File;
use ziparc_core::{
    create_archive, extract_archive, list_entries, EntryNaming, ExtractOptions, NoProgress,
    PackOptions,
};
use ziparc_testing::assertions::{assert_dirs_equal, collect_files, zip_entry_names};
use ziparc_testing::fixtures::create_archive_structure;
use ziparc_testing::{Method, StreamedZipBuilder, TestDir};

fn base_name(name: &str) -> String {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_pack_then_extract_preserves_tree() {
    let test_dir = TestDir::new().unwrap();
    create_archive_structure(&test_dir, "project").unwrap();
    let archive = test_dir.join("project.zip");
    let extracted = test_dir.join("extracted");

    create_archive(
        &test_dir.join("project"),
        &archive,
        &PackOptions::default(),
        &NoProgress,
    )
    .unwrap();

    let options = ExtractOptions {
        create_directory_entries: true,
        ..Default::default()
    };
    extract_archive(&archive, &extracted, &options, &NoProgress).unwrap();

    assert_dirs_equal(&test_dir.join("project"), &extracted).unwrap();
}

#[test]
fn test_packed_archives_list_with_resolved_sizes() {
    let test_dir = TestDir::new().unwrap();
    create_archive_structure(&test_dir, "project").unwrap();
    let archive = test_dir.join("project.zip");

    create_archive(
        &test_dir.join("project"),
        &archive,
        &PackOptions::default(),
        &NoProgress,
    )
    .unwrap();

    let listed = list_entries(File::open(&archive).unwrap()).unwrap();
    let names: Vec<_> = listed.iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, zip_entry_names(&archive).unwrap());

    let readme = listed.iter().find(|e| e.name == "README.md").unwrap();
    assert_eq!(readme.size, Some(39));
    assert!(listed.iter().all(|e| e.size.is_some() && e.crc32.is_some()));
}

#[test]
fn test_extract_then_repack_keeps_base_names() {
    let test_dir = TestDir::new().unwrap();
    let bytes = StreamedZipBuilder::new()
        .dir("docs")
        .streamed_file("docs/a.txt", b"alpha", Method::Deflated)
        .dir("docs/inner")
        .streamed_file("docs/inner/c.txt", b"charlie", Method::Stored)
        .file("b.txt", b"bravo", Method::Deflated)
        .build();
    let original = test_dir.create_file("original.zip", &bytes).unwrap();
    let extracted = test_dir.join("extracted");

    let options = ExtractOptions {
        create_directory_entries: true,
        ..Default::default()
    };
    extract_archive(&original, &extracted, &options, &NoProgress).unwrap();

    let repacked = test_dir.join("repacked.zip");
    let pack_options = PackOptions {
        include_folders: true,
        naming: EntryNaming::BaseName,
        ..Default::default()
    };
    create_archive(&extracted, &repacked, &pack_options, &NoProgress).unwrap();

    let mut expected: Vec<_> = ["docs/", "docs/a.txt", "docs/inner/", "docs/inner/c.txt", "b.txt"]
        .iter()
        .map(|name| base_name(name))
        .collect();
    let mut actual: Vec<_> = zip_entry_names(&repacked)
        .unwrap()
        .iter()
        .map(|name| base_name(name))
        .collect();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
}

#[test]
fn test_single_file_roundtrip() {
    let test_dir = TestDir::new().unwrap();
    let content: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let source = test_dir.create_file("data.bin", &content).unwrap();
    let archive = test_dir.join("data.zip");
    let extracted = test_dir.join("out");

    create_archive(&source, &archive, &PackOptions::default(), &NoProgress).unwrap();
    extract_archive(&archive, &extracted, &ExtractOptions::default(), &NoProgress).unwrap();

    assert_eq!(collect_files(&extracted).unwrap(), vec!["data.bin"]);
    assert_eq!(
        std::fs::read(extracted.join("data.bin")).unwrap(),
        content
    );
}
