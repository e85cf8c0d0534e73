//! Maximum-level bzip2 compression of release archives.
//!
//! The level is fixed so that repeated runs over the same archive produce
//! the same artifact bytes.

use super::naming::COMPRESSED_EXTENSION;
use bzip2::Compression;
use bzip2::write::BzEncoder;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use std::fs;
use std::io;

/// Compress `archive` to `<archive>.bz2` beside it and return the new path.
///
/// An existing artifact at the destination is replaced.
///
/// # Errors
///
/// Returns an I/O error if the archive cannot be read or the artifact
/// cannot be written.
pub fn compress(archive: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let destination = Utf8PathBuf::from(format!("{archive}{COMPRESSED_EXTENSION}"));
    compress_to(archive, &destination)?;
    Ok(destination)
}

/// Compress `archive` into `destination` at the maximum level.
///
/// # Errors
///
/// Returns an I/O error if reading or writing fails.
pub fn compress_to(archive: &Utf8Path, destination: &Utf8Path) -> io::Result<()> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let staged = tempfile::NamedTempFile::new_in(dir)?;

    let mut input = fs::File::open(archive)?;
    let mut encoder = BzEncoder::new(staged.reopen()?, Compression::best());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()?;
    staged.persist(destination).map_err(|e| e.error)?;

    info!("compressed {archive} to {destination}");
    Ok(())
}
