//! Release configuration loaded from `relpipe.toml`.
//!
//! Every field has a default so that an empty or absent file yields a usable
//! configuration. Unknown keys are rejected to catch typos before a release
//! is cut.

use crate::error::{ReleaseError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Default configuration file name looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "relpipe.toml";

/// Built-in announcement template.
pub const DEFAULT_ANNOUNCEMENT_TEMPLATE: &str =
    "$PROJECT $VERSION has been released. Changes: $URL";

/// Top-level release configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Project name used for artifact naming and the archive prefix.
    pub project: String,
    /// Path to the repository checkout.
    pub repository: Utf8PathBuf,
    /// Directory where artifacts are written.
    pub output_dir: Utf8PathBuf,
    /// Timeout applied to clone and transfer commands, in seconds.
    pub network_timeout_secs: Option<u64>,
    /// Paths (relative to the tree root) that must appear in every archive.
    pub required_paths: Vec<String>,
    /// Announcement template; `$VERSION`, `$URL` and `$PROJECT` are filled.
    pub announcement_template: Option<String>,
    /// Changelog URL, where `$VERSION` is substituted.
    pub changelog_url: Option<String>,
    /// Signing settings.
    pub signing: SigningConfig,
    /// Long-term escrow host.
    pub escrow: Option<EscrowConfig>,
    /// Package index upload channel.
    pub package_index: Option<PackageIndexConfig>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            project: "diffoscope".to_owned(),
            repository: Utf8PathBuf::from("."),
            output_dir: Utf8PathBuf::from("dist"),
            network_timeout_secs: None,
            required_paths: Vec::new(),
            announcement_template: None,
            changelog_url: None,
            signing: SigningConfig::default(),
            escrow: None,
            package_index: None,
        }
    }
}

/// Settings for the signing stage.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfig {
    /// Key identifier passed to `gpg --local-user`; gpg's default key when
    /// absent.
    pub key: Option<String>,
}

/// Escrow host destination.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EscrowConfig {
    /// `scp` destination such as `user@host:/srv/releases/`.
    pub destination: String,
}

/// Package index upload command.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PackageIndexConfig {
    /// Upload program, for example `twine`.
    pub program: String,
    /// Arguments placed before the artifact and signature paths.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ReleaseConfig {
    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| ReleaseError::Config {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_toml(path, &source)
    }

    /// Load `path` when given, otherwise `./relpipe.toml` when present,
    /// otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Config`] if an explicitly named or discovered
    /// file cannot be parsed.
    pub fn discover(path: Option<&Utf8Path>) -> Result<Self> {
        if let Some(explicit) = path {
            return Self::load(explicit);
        }
        let implicit = Utf8Path::new(CONFIG_FILE_NAME);
        if implicit.is_file() {
            Self::load(implicit)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration text; `path` is used for error reporting only.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Config`] on malformed TOML or unknown keys.
    pub fn from_toml(path: &Utf8Path, source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| ReleaseError::Config {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Network timeout as a [`Duration`].
    #[must_use]
    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_secs.map(Duration::from_secs)
    }

    /// The announcement template in effect.
    #[must_use]
    pub fn announcement_template(&self) -> &str {
        self.announcement_template
            .as_deref()
            .unwrap_or(DEFAULT_ANNOUNCEMENT_TEMPLATE)
    }
}
