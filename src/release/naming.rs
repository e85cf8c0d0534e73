//! Release artifact naming policy.
//!
//! Artifacts are named `<project>-<version>.tar.bz2`, their detached
//! signatures `<project>-<version>.tar.bz2.asc`, and the archive's internal
//! path prefix is `<project>-<version>/`.

use super::version::Version;
use std::fmt;

/// Extension of the uncompressed archive.
const ARCHIVE_EXTENSION: &str = ".tar";

/// Extension appended by the compressor.
pub const COMPRESSED_EXTENSION: &str = ".bz2";

/// Extension of detached armored signatures.
pub const SIGNATURE_EXTENSION: &str = ".asc";

/// The `<project>-<version>` stem shared by every release file.
///
/// # Examples
///
/// ```
/// use relpipe::release::naming::ReleaseName;
/// use relpipe::release::version::Version;
///
/// let name = ReleaseName::new("proj", Version::from_tag("v1.0.0")?);
/// assert_eq!(name.prefix(), "proj-1.0.0/");
/// assert_eq!(name.artifact_filename(), "proj-1.0.0.tar.bz2");
/// assert_eq!(name.signature_filename(), "proj-1.0.0.tar.bz2.asc");
/// # Ok::<(), relpipe::error::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseName {
    project: String,
    version: Version,
}

impl ReleaseName {
    /// Create a release name from a project name and version.
    #[must_use]
    pub fn new(project: impl Into<String>, version: Version) -> Self {
        Self {
            project: project.into(),
            version,
        }
    }

    /// Return the project component.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Return the version component.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Path prefix applied to every archive entry.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{self}/")
    }

    /// File name of the uncompressed archive.
    #[must_use]
    pub fn archive_filename(&self) -> String {
        format!("{self}{ARCHIVE_EXTENSION}")
    }

    /// File name of the compressed artifact.
    #[must_use]
    pub fn artifact_filename(&self) -> String {
        format!("{self}{ARCHIVE_EXTENSION}{COMPRESSED_EXTENSION}")
    }

    /// File name of the detached signature.
    #[must_use]
    pub fn signature_filename(&self) -> String {
        format!("{}{SIGNATURE_EXTENSION}", self.artifact_filename())
    }
}

/// Recover the archive prefix from an artifact file name such as
/// `proj-1.0.0.tar.bz2`.
#[must_use]
pub fn prefix_for_artifact(file_name: &str) -> Option<String> {
    let stem = file_name
        .strip_suffix(COMPRESSED_EXTENSION)?
        .strip_suffix(ARCHIVE_EXTENSION)?;
    (!stem.is_empty()).then(|| format!("{stem}/"))
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.version)
    }
}
