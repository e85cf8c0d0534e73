//! Deterministic source archives.
//!
//! The archive for a given `(reference, prefix)` pair is reproducible byte
//! for byte: entries are sorted, parent directories are synthesised, and
//! every header carries the commit timestamp, root ownership and a fixed
//! mode. Nothing from the local filesystem (mtimes, umask, user names)
//! leaks in.

use crate::error::{ReleaseError, Result, ValidationError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use tar::{EntryType, Header};

/// Mode for regular files.
const FILE_MODE: u32 = 0o644;
/// Mode for executables and directories.
const EXEC_MODE: u32 = 0o755;
/// Mode for symbolic links.
const LINK_MODE: u32 = 0o777;

/// How a tree entry is materialised in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular, non-executable file.
    File,
    /// A regular file with the executable bit.
    Executable,
    /// A symbolic link; the entry contents are the link target.
    Symlink,
}

/// One file of the tree at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// File contents, or the link target for symlinks.
    pub contents: Vec<u8>,
}

/// A reference resolved to a concrete commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTree {
    /// Full commit id.
    pub commit: String,
    /// Committer timestamp, used as every entry's mtime.
    pub timestamp: u64,
}

/// Source of tree contents at a reference.
pub trait TreeSource {
    /// Resolve `reference` to a commit.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::ReferenceResolution`] for missing or
    /// ambiguous references.
    fn resolve(&self, reference: &str) -> Result<ResolvedTree>;

    /// List every entry of the tree at `tree`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be read.
    fn entries(&self, tree: &ResolvedTree) -> Result<Vec<TreeEntry>>;
}

/// Everything that determines an archive's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    /// Reference to archive.
    pub reference: String,
    /// Path prefix for every entry; must end in `/`.
    pub prefix: String,
    /// Where the archive is written.
    pub output: Utf8PathBuf,
}

/// Result of [`build_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutput {
    /// Path of the written tar file.
    pub path: Utf8PathBuf,
    /// Commit the archive was built from.
    pub commit: String,
    /// Number of file and symlink entries (directories excluded).
    pub file_count: usize,
}

/// Check that `prefix` is a relative directory path ending in `/`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidPrefix`] describing the first problem.
pub fn validate_prefix(prefix: &str) -> std::result::Result<(), ValidationError> {
    let reject = |reason: &str| ValidationError::InvalidPrefix {
        value: prefix.to_owned(),
        reason: reason.to_owned(),
    };
    if prefix.is_empty() || prefix == "/" {
        return Err(reject("prefix must name a directory"));
    }
    if !prefix.ends_with('/') {
        return Err(reject("prefix must end with '/'"));
    }
    if prefix.starts_with('/') {
        return Err(reject("prefix must be relative"));
    }
    if prefix.split('/').any(|part| part == "..") {
        return Err(reject("prefix must not contain '..'"));
    }
    Ok(())
}

/// Build the archive described by `spec` from `source`.
///
/// The archive is written to a temporary file beside `spec.output` and
/// renamed into place, so a failed build never leaves a truncated archive.
///
/// # Errors
///
/// Returns [`ReleaseError::ReferenceResolution`] if the reference cannot be
/// resolved, a validation error for a bad prefix, or [`ReleaseError::Io`]
/// on write failure.
pub fn build_archive(source: &dyn TreeSource, spec: &ArchiveSpec) -> Result<ArchiveOutput> {
    validate_prefix(&spec.prefix)?;
    let tree = source.resolve(&spec.reference)?;
    let entries = source.entries(&tree)?;
    debug!(
        "archiving {} entries of {} under {}",
        entries.len(),
        tree.commit,
        spec.prefix
    );

    let dir = parent_dir(&spec.output);
    fs::create_dir_all(dir)?;
    let staged = tempfile::NamedTempFile::new_in(dir)?;
    let file = write_tar(staged.reopen()?, &spec.prefix, tree.timestamp, &entries)?;
    file.sync_all()?;
    staged.persist(&spec.output).map_err(|e| e.error)?;

    info!("wrote {}", spec.output);
    Ok(ArchiveOutput {
        path: spec.output.clone(),
        commit: tree.commit,
        file_count: entries.len(),
    })
}

/// An archive member before serialisation.
enum Member<'e> {
    Directory,
    Entry(&'e TreeEntry),
}

/// Write a deterministic tar stream of `entries` under `prefix`.
///
/// # Errors
///
/// Returns an I/O error if writing fails or a symlink target is not UTF-8.
pub fn write_tar<W: Write>(
    writer: W,
    prefix: &str,
    timestamp: u64,
    entries: &[TreeEntry],
) -> io::Result<W> {
    let mut members: BTreeMap<String, Member<'_>> = BTreeMap::new();
    members.insert(prefix.to_owned(), Member::Directory);
    for entry in entries {
        for dir in parent_directories(&entry.path) {
            members
                .entry(format!("{prefix}{dir}/"))
                .or_insert(Member::Directory);
        }
        members.insert(format!("{prefix}{}", entry.path), Member::Entry(entry));
    }

    let mut builder = tar::Builder::new(writer);
    for (path, member) in &members {
        let mut header = Header::new_gnu();
        header.set_mtime(timestamp);
        header.set_uid(0);
        header.set_gid(0);
        match member {
            Member::Directory => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(EXEC_MODE);
                header.set_size(0);
                builder.append_data(&mut header, path, io::empty())?;
            }
            Member::Entry(entry) => append_entry(&mut builder, &mut header, path, entry)?,
        }
    }
    builder.into_inner()
}

fn append_entry<W: Write>(
    builder: &mut tar::Builder<W>,
    header: &mut Header,
    path: &str,
    entry: &TreeEntry,
) -> io::Result<()> {
    match entry.kind {
        EntryKind::Symlink => {
            let target = std::str::from_utf8(&entry.contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(LINK_MODE);
            header.set_size(0);
            builder.append_link(header, path, target)
        }
        EntryKind::File | EntryKind::Executable => {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(if entry.kind == EntryKind::Executable {
                EXEC_MODE
            } else {
                FILE_MODE
            });
            header.set_size(entry.contents.len() as u64);
            builder.append_data(header, path, entry.contents.as_slice())
        }
    }
}

/// Every ancestor directory of `path`, shallowest first, without the
/// trailing slash.
fn parent_directories(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .filter_map(move |(idx, _)| path.get(..idx))
}

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

/// A [`TreeSource`] backed by an in-memory list of entries.
///
/// Useful for packaging trees that do not live in a repository, and for
/// exercising the archive format in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    references: BTreeMap<String, (ResolvedTree, Vec<TreeEntry>)>,
}

impl MemoryTree {
    /// Register `entries` under `reference`.
    pub fn insert(&mut self, reference: &str, tree: ResolvedTree, entries: Vec<TreeEntry>) {
        self.references
            .insert(reference.to_owned(), (tree, entries));
    }
}

impl TreeSource for MemoryTree {
    fn resolve(&self, reference: &str) -> Result<ResolvedTree> {
        self.references
            .get(reference)
            .map(|(tree, _)| tree.clone())
            .ok_or_else(|| ReleaseError::ReferenceResolution {
                reference: reference.to_owned(),
                reason: "unknown reference".to_owned(),
            })
    }

    fn entries(&self, tree: &ResolvedTree) -> Result<Vec<TreeEntry>> {
        self.references
            .values()
            .find(|(known, _)| known.commit == tree.commit)
            .map(|(_, entries)| entries.clone())
            .ok_or_else(|| ReleaseError::ReferenceResolution {
                reference: tree.commit.clone(),
                reason: "unknown commit".to_owned(),
            })
    }
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
