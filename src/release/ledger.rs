//! Persistent record of completed transfers.
//!
//! The ledger lives beside the artifact as `<artifact>.published.json` and
//! lists which destinations accepted which artifact digest. The publisher
//! consults it before every transfer so that repeating a publish only
//! touches destinations that have not yet received these exact bytes.

use super::digest::Sha256Digest;
use crate::error::{ReleaseError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

/// Suffix appended to the artifact path to locate its ledger.
const LEDGER_SUFFIX: &str = ".published.json";

/// One destination's acceptance of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishRecord {
    /// Artifact file name.
    pub artifact: String,
    /// Digest of the artifact bytes that were transferred.
    pub sha256: Sha256Digest,
    /// Destination name.
    pub destination: String,
}

/// The set of completed transfers for an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishLedger {
    records: Vec<PublishRecord>,
}

impl PublishLedger {
    /// Ledger path for `artifact`.
    #[must_use]
    pub fn path_for(artifact: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{artifact}{LEDGER_SUFFIX}"))
    }

    /// Load the ledger at `path`; a missing file is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Ledger`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| ledger_error(path, e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ledger_error(path, e.to_string())),
        }
    }

    /// Write the ledger to `path`, replacing any previous contents
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Ledger`] if the file cannot be written.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ledger_error(path, e.to_string()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let write = || -> std::io::Result<()> {
            let mut staged = tempfile::NamedTempFile::new_in(dir)?;
            staged.write_all(json.as_bytes())?;
            staged.write_all(b"\n")?;
            staged.persist(path).map_err(|e| e.error)?;
            Ok(())
        };
        write().map_err(|e| ledger_error(path, e.to_string()))
    }

    /// Whether `destination` already accepted `artifact` with `sha256`.
    #[must_use]
    pub fn contains(&self, artifact: &str, sha256: &Sha256Digest, destination: &str) -> bool {
        self.records.iter().any(|r| {
            r.artifact == artifact && &r.sha256 == sha256 && r.destination == destination
        })
    }

    /// Record a completed transfer; duplicates are ignored.
    pub fn record(&mut self, artifact: &str, sha256: &Sha256Digest, destination: &str) {
        if !self.contains(artifact, sha256, destination) {
            self.records.push(PublishRecord {
                artifact: artifact.to_owned(),
                sha256: sha256.clone(),
                destination: destination.to_owned(),
            });
        }
    }

    /// Every recorded transfer.
    #[must_use]
    pub fn records(&self) -> &[PublishRecord] {
        &self.records
    }
}

fn ledger_error(path: &Utf8Path, reason: String) -> ReleaseError {
    ReleaseError::Ledger {
        path: path.to_owned(),
        reason,
    }
}
