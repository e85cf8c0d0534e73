//! Bug reports for the distribution's bug tracker.
//!
//! The tracker reads pseudo-headers from the first lines of the message
//! body, so the layout is fixed:
//!
//! ```text
//! To: submit@bugs.debian.org
//! Subject: <subject>
//!
//! Source: <source>
//! Version: <version>
//! Severity: <severity>
//!
//! <body>
//! ```
//!
//! Sending is left to the operator's mail client.

use crate::error::ValidationError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::str::FromStr;

/// Address every report is sent to.
pub const BUG_RECIPIENT: &str = "submit@bugs.debian.org";

/// Tracker severity levels, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Makes the package unusable or causes data loss.
    Grave,
    /// Violates policy or makes the package unfit for release.
    Serious,
    /// A major effect on usability.
    Important,
    /// The default.
    Normal,
    /// A problem that does not affect usefulness.
    Minor,
    /// A feature request.
    Wishlist,
}

impl Severity {
    /// Every severity, most severe first.
    pub const ALL: [Self; 6] = [
        Self::Grave,
        Self::Serious,
        Self::Important,
        Self::Normal,
        Self::Minor,
        Self::Wishlist,
    ];

    /// The tracker's spelling of this severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grave => "grave",
            Self::Serious => "serious",
            Self::Important => "important",
            Self::Normal => "normal",
            Self::Minor => "minor",
            Self::Wishlist => "wishlist",
        }
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    /// Parse an exact, lowercase severity name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|severity| severity.as_str() == value)
            .ok_or_else(|| ValidationError::InvalidSeverity {
                value: value.to_owned(),
            })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A composed bug report, ready to be handed to a mail client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugReport {
    subject: String,
    source: String,
    version: String,
    severity: Severity,
    body: String,
    attachments: Vec<Utf8PathBuf>,
}

impl BugReport {
    /// Compose a report, validating `severity`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSeverity`] if `severity` is not one
    /// of the six tracker severities.
    pub fn compose(
        source: impl Into<String>,
        version: impl Into<String>,
        severity: &str,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            subject: subject.into(),
            source: source.into(),
            version: version.into(),
            severity: severity.parse()?,
            body: body.into(),
            attachments: Vec::new(),
        })
    }

    /// Attach files, typically a generated patch series.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Utf8PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Recipient address.
    #[must_use]
    pub const fn recipient(&self) -> &'static str {
        BUG_RECIPIENT
    }

    /// Validated severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Attached files.
    #[must_use]
    pub fn attachments(&self) -> &[Utf8PathBuf] {
        &self.attachments
    }
}

impl fmt::Display for BugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "To: {BUG_RECIPIENT}")?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Severity: {}", self.severity)?;
        writeln!(f)?;
        write!(f, "{}", self.body)?;
        if !self.body.ends_with('\n') {
            writeln!(f)?;
        }
        if !self.attachments.is_empty() {
            writeln!(f)?;
            writeln!(f, "Attachments:")?;
            for path in &self.attachments {
                writeln!(f, "  {}", attachment_name(path))?;
            }
        }
        Ok(())
    }
}

fn attachment_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}
