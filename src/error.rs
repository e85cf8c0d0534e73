//! Error types for the release and patch-submission workflows.
//!
//! [`ReleaseError`] is the crate-wide error surfaced to the operator. Value
//! validation failures live in [`ValidationError`] so that they can be
//! compared and cloned in tests, mirroring how the stages report bad input
//! separately from I/O and tool failures.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while running a release or patch workflow stage.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The reference does not exist in the repository.
    #[error("reference {reference} does not exist in the repository")]
    InvalidReference {
        /// The reference that failed to resolve.
        reference: String,
    },

    /// The reference could not be resolved to a single tree.
    #[error("could not resolve reference {reference}: {reason}")]
    ReferenceResolution {
        /// The reference that failed to resolve.
        reference: String,
        /// Description of the resolution failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signing key was unavailable or the signing tool rejected the
    /// operation.
    #[error("signing {artifact} failed: {reason}")]
    Signing {
        /// The artifact being signed or verified.
        artifact: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Upload to a publish destination failed.
    #[error(transparent)]
    Transfer(#[from] crate::release::publish::TransferError),

    /// One or more destinations failed while others succeeded.
    #[error(
        "partial publish of {artifact}: failed for {}; re-run publish to retry",
        failed.join(", ")
    )]
    PartialPublish {
        /// Artifact file name.
        artifact: String,
        /// Names of destinations that did not accept the artifact.
        failed: Vec<String>,
    },

    /// A value supplied by the operator did not validate.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The branch head has no commits beyond the base reference.
    #[error("no commits on {head} ahead of {base}")]
    NoCommitsAhead {
        /// Base reference of the series.
        base: String,
        /// Head reference of the series.
        head: String,
    },

    /// A git command failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed (clone, checkout, and so on).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Required paths were absent from a built archive.
    #[error("archive {archive} is missing required entries: {}", missing.join(", "))]
    MissingArchiveEntries {
        /// The archive that was inspected.
        archive: Utf8PathBuf,
        /// Paths that were expected but not found.
        missing: Vec<String>,
    },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration at {path}: {reason}")]
    Config {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// The publish ledger could not be read or written.
    #[error("publish ledger {path} is unusable: {reason}")]
    Ledger {
        /// Path to the ledger file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Errors arising from invalid operator-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A severity outside the closed set was supplied.
    #[error(
        "invalid severity \"{value}\"; expected one of: grave, serious, important, normal, minor, wishlist"
    )]
    InvalidSeverity {
        /// The rejected severity.
        value: String,
    },

    /// A template placeholder has no supplied value.
    #[error("no value supplied for placeholder ${name}")]
    MissingPlaceholder {
        /// Placeholder name without the leading `$`.
        name: String,
    },

    /// A version string is empty or contains forbidden characters.
    #[error("invalid version \"{value}\": {reason}")]
    InvalidVersion {
        /// The rejected version.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// An archive path prefix is unsafe or malformed.
    #[error("invalid archive prefix \"{value}\": {reason}")]
    InvalidPrefix {
        /// The rejected prefix.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A branch name is empty or malformed.
    #[error("invalid branch name \"{value}\"")]
    InvalidBranchName {
        /// The rejected branch name.
        value: String,
    },
}

/// Result type alias using [`ReleaseError`].
pub type Result<T> = std::result::Result<T, ReleaseError>;
