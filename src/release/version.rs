//! Version identifiers derived from VCS references.
//!
//! A [`Version`] is validated once and never changes; it names artifacts
//! and fills announcement templates.

use crate::error::{Result, ValidationError};
use crate::git::{GitRepository, tag_name};
use log::debug;
use std::fmt;

/// A validated release version such as `1.0.0` or `78`.
///
/// # Examples
///
/// ```
/// use relpipe::release::version::Version;
///
/// let version = Version::from_tag("v1.0.0")?;
/// assert_eq!(version.as_str(), "1.0.0");
/// # Ok::<(), relpipe::error::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Derive a version from a tag name, dropping a `v` prefix that precedes
    /// a digit.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidVersion`] if the remaining text is
    /// not a valid version.
    pub fn from_tag(tag: &str) -> std::result::Result<Self, ValidationError> {
        let trimmed = tag.trim();
        let stripped = match trimmed.strip_prefix('v') {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => trimmed,
        };
        Self::try_from(stripped)
    }

    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Version {
    type Error = ValidationError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        validate_version(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Version {
    type Error = ValidationError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        validate_version(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_version(value: &str) -> std::result::Result<(), ValidationError> {
    let reject = |reason: &str| ValidationError::InvalidVersion {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    if value.is_empty() {
        return Err(reject("version must not be empty"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(reject("version must not contain whitespace"));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(reject("version must not contain path separators"));
    }
    if value.starts_with('.') || value.starts_with('-') {
        return Err(reject("version must start with a letter or digit"));
    }
    Ok(())
}

/// Turns a reference into a [`Version`].
///
/// A tag names its own version, even when other tags point at the same
/// commit. Any other reference is described relative to the nearest tag.
///
/// # Errors
///
/// Returns [`crate::error::ReleaseError::InvalidReference`] if the reference
/// does not exist, or a validation error if the described name is not a
/// usable version.
pub fn resolve_version(repo: &GitRepository<'_>, reference: &str) -> Result<Version> {
    let commit = repo.resolve_commit(reference)?;
    if repo.is_tag(reference)? {
        debug!("{reference} ({commit}) is a tag");
        return Ok(Version::from_tag(tag_name(reference))?);
    }
    let described = repo.describe(reference)?;
    debug!("{reference} ({commit}) describes as {described}");
    Ok(Version::from_tag(&described)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, stdout_output};
    use rstest::rstest;

    #[rstest]
    #[case::plain("78", "78")]
    #[case::v_prefix("v1.0.0", "1.0.0")]
    #[case::v_word("vnext", "vnext")]
    #[case::describe_suffix("v2.3-4-gabcdef0", "2.3-4-gabcdef0")]
    #[case::surrounding_whitespace(" 2.3\n", "2.3")]
    fn from_tag_normalises(#[case] tag: &str, #[case] expected: &str) {
        assert_eq!(Version::from_tag(tag).expect("valid").as_str(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::inner_space("1 0")]
    #[case::slash("release/1.0")]
    #[case::leading_dot(".1")]
    fn rejects_malformed_versions(#[case] value: &str) {
        assert!(matches!(
            Version::try_from(value),
            Err(ValidationError::InvalidVersion { .. })
        ));
    }

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567\n";

    fn commit_lookup(reference: &str) -> ExpectedCall {
        let spec = format!("{reference}^{{commit}}");
        ExpectedCall::new(
            "git",
            [
                "-C",
                "/repo",
                "rev-parse",
                "--verify",
                "--quiet",
                spec.as_str(),
            ],
            stdout_output(COMMIT),
        )
    }

    fn tag_lookup(reference: &str, found: bool) -> ExpectedCall {
        let name = format!("refs/tags/{reference}");
        let output = if found {
            stdout_output(COMMIT)
        } else {
            failure_output("")
        };
        ExpectedCall::new(
            "git",
            [
                "-C",
                "/repo",
                "rev-parse",
                "--verify",
                "--quiet",
                name.as_str(),
            ],
            output,
        )
    }

    #[rstest]
    #[case::bare("v1.0.0")]
    #[case::qualified("refs/tags/v1.0.0")]
    fn resolve_version_takes_the_named_tag(#[case] reference: &str) {
        let executor = StubExecutor::new(vec![
            commit_lookup(reference),
            tag_lookup("v1.0.0", true),
        ]);
        let repo = GitRepository::new(&executor, "/repo");

        let version = resolve_version(&repo, reference).expect("version");
        assert_eq!(version.as_str(), "1.0.0");
        executor.assert_finished();
    }

    #[rstest]
    fn resolve_version_describes_other_references() {
        let executor = StubExecutor::new(vec![
            commit_lookup("master"),
            tag_lookup("master", false),
            ExpectedCall::new(
                "git",
                ["-C", "/repo", "describe", "--tags", "--always", "master"],
                stdout_output("v1.0.0-3-gabcdef0\n"),
            ),
        ]);
        let repo = GitRepository::new(&executor, "/repo");

        let version = resolve_version(&repo, "master").expect("version");
        assert_eq!(version.as_str(), "1.0.0-3-gabcdef0");
        executor.assert_finished();
    }

    #[rstest]
    fn resolve_version_fails_for_unknown_reference() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "git",
            ["-C", "/repo", "rev-parse", "--verify", "--quiet", "v0.0.0^{commit}"],
            failure_output(""),
        )]);
        let repo = GitRepository::new(&executor, "/repo");

        let err = resolve_version(&repo, "v0.0.0").expect_err("unknown reference");
        assert!(matches!(err, ReleaseError::InvalidReference { .. }));
    }
}
