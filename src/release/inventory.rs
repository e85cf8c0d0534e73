//! Archive inventory checks.
//!
//! Packaging tools have been known to drop test fixtures from a tree before
//! it is archived. [`check_required_paths`] reads a built artifact back and
//! reports every configured path that did not make it in.

use crate::error::{ReleaseError, Result};
use bzip2::read::BzDecoder;
use camino::{FromPathBufError, Utf8Path, Utf8PathBuf};
use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;

/// Paths of every member of a `.tar.bz2` artifact, with directory entries'
/// trailing slashes removed.
///
/// # Errors
///
/// Returns [`ReleaseError::Io`] if the artifact cannot be read or decoded.
pub fn list_entries(artifact: &Utf8Path) -> Result<BTreeSet<String>> {
    let decoder = BzDecoder::new(fs::File::open(artifact)?);
    list_tar_entries(decoder)
}

fn list_tar_entries<R: Read>(reader: R) -> Result<BTreeSet<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut paths = BTreeSet::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let path = Utf8PathBuf::try_from(entry.path()?.into_owned())
            .map_err(FromPathBufError::into_io_error)?;
        paths.insert(path.as_str().trim_end_matches('/').to_owned());
    }
    Ok(paths)
}

/// Return the members of `required` (paths relative to the tree root) that
/// are absent from `entries` once `prefix` is applied.
#[must_use]
pub fn missing_paths(entries: &BTreeSet<String>, prefix: &str, required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|path| {
            let wanted = format!("{prefix}{}", path.trim_matches('/'));
            !entries.contains(&wanted)
        })
        .cloned()
        .collect()
}

/// Fail when any of `required` is missing from `artifact`.
///
/// # Errors
///
/// Returns [`ReleaseError::MissingArchiveEntries`] naming every missing
/// path, or an I/O error if the artifact cannot be read.
pub fn check_required_paths(
    artifact: &Utf8Path,
    prefix: &str,
    required: &[String],
) -> Result<()> {
    if required.is_empty() {
        return Ok(());
    }
    let entries = list_entries(artifact)?;
    debug!(
        "checking {} required paths against {} entries",
        required.len(),
        entries.len()
    );
    let missing = missing_paths(&entries, prefix, required);
    if missing.is_empty() {
        return Ok(());
    }
    Err(ReleaseError::MissingArchiveEntries {
        archive: artifact.to_owned(),
        missing,
    })
}
