//! Unit tests for deterministic archive creation.

use super::*;
use rstest::{fixture, rstest};
use std::io::Read;
use tempfile::TempDir;

const TIMESTAMP: u64 = 1_700_000_000;

fn file(path: &str, contents: &str) -> TreeEntry {
    TreeEntry {
        path: path.to_owned(),
        kind: EntryKind::File,
        contents: contents.as_bytes().to_vec(),
    }
}

#[fixture]
fn tree() -> MemoryTree {
    let mut tree = MemoryTree::default();
    tree.insert(
        "v1.0.0",
        ResolvedTree {
            commit: "c0ffee".to_owned(),
            timestamp: TIMESTAMP,
        },
        vec![
            file("tests/data/test1.tar", "fixture"),
            file("README.rst", "readme\n"),
            TreeEntry {
                path: "bin/proj".to_owned(),
                kind: EntryKind::Executable,
                contents: b"#!/usr/bin/env python3\n".to_vec(),
            },
            TreeEntry {
                path: "docs/README".to_owned(),
                kind: EntryKind::Symlink,
                contents: b"../README.rst".to_vec(),
            },
        ],
    );
    tree
}

fn utf8(dir: &TempDir) -> &Utf8Path {
    Utf8Path::from_path(dir.path()).expect("non-UTF8 temp path")
}

fn spec(dir: &TempDir, name: &str) -> ArchiveSpec {
    ArchiveSpec {
        reference: "v1.0.0".to_owned(),
        prefix: "proj-1.0.0/".to_owned(),
        output: utf8(dir).join(name),
    }
}

struct Listed {
    path: String,
    entry_type: EntryType,
    mode: u32,
    mtime: u64,
    uid: u64,
    body: Vec<u8>,
}

fn list(path: &Utf8Path) -> Vec<Listed> {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = tar::Archive::new(file);
    archive
        .entries()
        .expect("entries")
        .map(|e| {
            let mut entry = e.expect("entry");
            let mut body = Vec::new();
            entry.read_to_end(&mut body).expect("read entry");
            let header = entry.header();
            Listed {
                path: Utf8PathBuf::try_from(entry.path().expect("path").into_owned())
                    .expect("UTF-8 entry path")
                    .into_string(),
                entry_type: header.entry_type(),
                mode: header.mode().expect("mode"),
                mtime: header.mtime().expect("mtime"),
                uid: header.uid().expect("uid"),
                body,
            }
        })
        .collect()
}

#[rstest]
fn identical_inputs_produce_identical_bytes(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let first = build_archive(&tree, &spec(&dir, "a.tar")).expect("first build");
    let second = build_archive(&tree, &spec(&dir, "b.tar")).expect("second build");

    let a = fs::read(&first.path).expect("read a");
    let b = fs::read(&second.path).expect("read b");
    assert_eq!(a, b);
    assert_eq!(first.commit, "c0ffee");
    assert_eq!(first.file_count, 4);
}

#[rstest]
fn entry_order_does_not_affect_output(tree: MemoryTree) {
    let resolved = tree.resolve("v1.0.0").expect("resolve");
    let mut entries = tree.entries(&resolved).expect("entries");
    let forward = write_tar(Vec::new(), "p/", TIMESTAMP, &entries).expect("forward");
    entries.reverse();
    let reversed = write_tar(Vec::new(), "p/", TIMESTAMP, &entries).expect("reversed");
    assert_eq!(forward, reversed);
}

#[rstest]
fn every_path_is_under_the_prefix(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let output = build_archive(&tree, &spec(&dir, "out.tar")).expect("build");

    let listed = list(&output.path);
    assert!(!listed.is_empty());
    for entry in &listed {
        assert!(
            entry.path.starts_with("proj-1.0.0"),
            "{} escapes the prefix",
            entry.path
        );
    }
}

#[rstest]
fn parent_directories_precede_their_children(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let output = build_archive(&tree, &spec(&dir, "out.tar")).expect("build");

    let paths: Vec<String> = list(&output.path)
        .into_iter()
        .map(|e| e.path.trim_end_matches('/').to_owned())
        .collect();
    let position = |p: &str| paths.iter().position(|x| x == p).expect(p);
    assert!(position("proj-1.0.0") < position("proj-1.0.0/README.rst"));
    assert!(position("proj-1.0.0/tests") < position("proj-1.0.0/tests/data"));
    assert!(position("proj-1.0.0/tests/data") < position("proj-1.0.0/tests/data/test1.tar"));
}

#[rstest]
fn headers_are_normalised(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let output = build_archive(&tree, &spec(&dir, "out.tar")).expect("build");

    for entry in list(&output.path) {
        assert_eq!(entry.mtime, TIMESTAMP, "mtime of {}", entry.path);
        assert_eq!(entry.uid, 0, "uid of {}", entry.path);
        let expected_mode = match entry.entry_type {
            EntryType::Directory => EXEC_MODE,
            EntryType::Symlink => LINK_MODE,
            _ if entry.path.ends_with("bin/proj") => EXEC_MODE,
            _ => FILE_MODE,
        };
        assert_eq!(entry.mode, expected_mode, "mode of {}", entry.path);
    }
}

#[rstest]
fn file_contents_and_links_survive(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let output = build_archive(&tree, &spec(&dir, "out.tar")).expect("build");
    let listed = list(&output.path);

    let readme = listed
        .iter()
        .find(|e| e.path == "proj-1.0.0/README.rst")
        .expect("readme present");
    assert_eq!(readme.body, b"readme\n");

    let link = listed
        .iter()
        .find(|e| e.path == "proj-1.0.0/docs/README")
        .expect("link present");
    assert!(link.entry_type.is_symlink());
}

#[rstest]
#[case::empty("")]
#[case::no_trailing_slash("proj-1.0.0")]
#[case::absolute("/proj-1.0.0/")]
#[case::parent("../proj/")]
fn rejects_unsafe_prefixes(#[case] prefix: &str) {
    assert!(matches!(
        validate_prefix(prefix),
        Err(ValidationError::InvalidPrefix { .. })
    ));
}

#[rstest]
fn unknown_reference_is_a_resolution_error(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let mut bad = spec(&dir, "out.tar");
    bad.reference = "v9.9.9".to_owned();

    let err = build_archive(&tree, &bad).expect_err("unknown reference");
    assert!(matches!(err, ReleaseError::ReferenceResolution { .. }));
    assert!(!bad.output.exists());
}

#[rstest]
fn nested_output_directories_are_created(tree: MemoryTree) {
    let dir = TempDir::new().expect("temp dir");
    let mut nested = spec(&dir, "out.tar");
    nested.output = utf8(&dir).join("dist/nested/out.tar");

    let output = build_archive(&tree, &nested).expect("build");
    assert!(output.path.exists());
}

#[rstest]
fn parent_directories_are_listed_shallowest_first() {
    let dirs: Vec<&str> = parent_directories("a/b/c.txt").collect();
    assert_eq!(dirs, vec!["a", "a/b"]);
}
