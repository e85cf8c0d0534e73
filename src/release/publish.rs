//! Distribution of signed artifacts to their destinations.
//!
//! A release goes to two places: a long-term escrow host and a package
//! index. Neither transfer is transactional, so a failure part way leaves
//! some destinations holding the artifact and others not. The
//! [`Publisher`] records each completed transfer in a [`PublishLedger`] and
//! a repeated publish resumes with the destinations that are still missing.

use super::digest::Sha256Digest;
use super::ledger::PublishLedger;
use super::signing::SignedArtifact;
use crate::error::{ReleaseError, Result};
use crate::exec::{CommandExecutor, failure_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use std::fs;

/// A destination rejected or failed to receive an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transfer to {destination} failed: {message}")]
pub struct TransferError {
    /// Name of the destination.
    pub destination: String,
    /// Description of the failure.
    pub message: String,
}

impl TransferError {
    fn new(destination: &str, message: impl Into<String>) -> Self {
        Self {
            destination: destination.to_owned(),
            message: message.into(),
        }
    }
}

/// A place that accepts a signed artifact.
#[cfg_attr(test, mockall::automock)]
pub trait Destination {
    /// Stable name used in logs and ledger records.
    fn name(&self) -> String;

    /// Transfer the artifact and its signature.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] if the destination did not accept both
    /// files.
    fn transfer(&self, signed: &SignedArtifact) -> std::result::Result<(), TransferError>;
}

/// Copies artifacts to an escrow host with `scp`.
pub struct EscrowHost<'a> {
    executor: &'a dyn CommandExecutor,
    target: String,
}

impl<'a> EscrowHost<'a> {
    /// Destination name recorded in the ledger.
    pub const NAME: &'static str = "escrow";

    /// Create an escrow destination for an `scp` target such as
    /// `user@host:/srv/releases/`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, target: impl Into<String>) -> Self {
        Self {
            executor,
            target: target.into(),
        }
    }
}

impl Destination for EscrowHost<'_> {
    fn name(&self) -> String {
        Self::NAME.to_owned()
    }

    fn transfer(&self, signed: &SignedArtifact) -> std::result::Result<(), TransferError> {
        run_transfer(
            self.executor,
            Self::NAME,
            "scp",
            &[
                signed.artifact.as_str(),
                signed.signature.as_str(),
                self.target.as_str(),
            ],
        )
    }
}

/// Uploads artifacts with a package index client such as `twine`.
pub struct PackageIndex<'a> {
    executor: &'a dyn CommandExecutor,
    program: String,
    args: Vec<String>,
}

impl<'a> PackageIndex<'a> {
    /// Destination name recorded in the ledger.
    pub const NAME: &'static str = "package-index";

    /// Create an uploader running `program args... <artifact> <signature>`.
    #[must_use]
    pub fn new(
        executor: &'a dyn CommandExecutor,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            args,
        }
    }
}

impl Destination for PackageIndex<'_> {
    fn name(&self) -> String {
        Self::NAME.to_owned()
    }

    fn transfer(&self, signed: &SignedArtifact) -> std::result::Result<(), TransferError> {
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.extend([signed.artifact.as_str(), signed.signature.as_str()]);
        run_transfer(self.executor, Self::NAME, &self.program, &args)
    }
}

fn run_transfer(
    executor: &dyn CommandExecutor,
    destination: &str,
    program: &str,
    args: &[&str],
) -> std::result::Result<(), TransferError> {
    let output = executor
        .run_networked(program, args)
        .map_err(|e| TransferError::new(destination, format!("could not run {program}: {e}")))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(TransferError::new(destination, failure_message(&output)))
    }
}

/// Copies artifacts into a local directory, for mirrors on shared storage.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    name: String,
    directory: Utf8PathBuf,
}

impl LocalDirectory {
    /// Create a destination that copies into `directory`.
    #[must_use]
    pub fn new(name: impl Into<String>, directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
        }
    }

    fn copy_into(&self, source: &Utf8Path) -> std::io::Result<()> {
        let file_name = source
            .file_name()
            .ok_or_else(|| std::io::Error::other("source has no file name"))?;
        fs::copy(source, self.directory.join(file_name))?;
        Ok(())
    }
}

impl Destination for LocalDirectory {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn transfer(&self, signed: &SignedArtifact) -> std::result::Result<(), TransferError> {
        let copy = || -> std::io::Result<()> {
            fs::create_dir_all(&self.directory)?;
            self.copy_into(&signed.artifact)?;
            self.copy_into(&signed.signature)
        };
        copy().map_err(|e| TransferError::new(&self.name, e.to_string()))
    }
}

/// What happened at one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The artifact was transferred during this run.
    Transferred,
    /// The ledger shows an earlier run already transferred these bytes.
    AlreadyPublished,
    /// The transfer failed.
    Failed(TransferError),
}

/// Per-destination outcomes of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Artifact file name.
    pub artifact: String,
    /// Outcome for each destination, in publish order.
    pub outcomes: Vec<(String, PublishOutcome)>,
}

impl PublishReport {
    /// Names of destinations whose transfer failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, PublishOutcome::Failed(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// True when every destination holds the artifact.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed().is_empty()
    }

    /// True when some destinations hold the artifact and others do not.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        let failed = self.failed().len();
        failed > 0 && failed < self.outcomes.len()
    }

    /// Convert failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::PartialPublish`] when only some destinations
    /// failed, or the first [`ReleaseError::Transfer`] when all of them did.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        if self.is_partial() {
            return Err(ReleaseError::PartialPublish {
                artifact: self.artifact.clone(),
                failed: self.failed().into_iter().map(str::to_owned).collect(),
            });
        }
        let first = self.outcomes.into_iter().find_map(|(_, outcome)| match outcome {
            PublishOutcome::Failed(err) => Some(err),
            _ => None,
        });
        match first {
            Some(err) => Err(err.into()),
            None => Err(ReleaseError::PartialPublish {
                artifact: self.artifact,
                failed: Vec::new(),
            }),
        }
    }
}

/// Publishes a signed artifact to each destination at most once.
pub struct Publisher<'d> {
    destinations: Vec<&'d dyn Destination>,
}

impl<'d> Publisher<'d> {
    /// Publish to the escrow host first and the package index second.
    #[must_use]
    pub fn new(escrow: &'d dyn Destination, index: &'d dyn Destination) -> Self {
        Self {
            destinations: vec![escrow, index],
        }
    }

    /// Publish to an arbitrary ordered set of destinations.
    #[must_use]
    pub fn with_destinations(destinations: Vec<&'d dyn Destination>) -> Self {
        Self { destinations }
    }

    /// Transfer `signed` to every destination not yet recorded in its
    /// ledger.
    ///
    /// Every destination is attempted even after a failure. Successful
    /// transfers are written to the ledger as soon as they complete.
    ///
    /// # Errors
    ///
    /// Returns an error only when the artifact or ledger cannot be read or
    /// written; transfer failures are reported in the [`PublishReport`].
    pub fn publish(&self, signed: &SignedArtifact) -> Result<PublishReport> {
        let artifact = signed.artifact_name().to_owned();
        let digest = Sha256Digest::of_file(&signed.artifact)?;
        let ledger_path = PublishLedger::path_for(&signed.artifact);
        let mut ledger = PublishLedger::load(&ledger_path)?;

        let mut outcomes = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let name = destination.name();
            let outcome = publish_one(*destination, signed, &digest, &mut ledger, &ledger_path)?;
            outcomes.push((name, outcome));
        }
        Ok(PublishReport { artifact, outcomes })
    }
}

fn publish_one(
    destination: &dyn Destination,
    signed: &SignedArtifact,
    digest: &Sha256Digest,
    ledger: &mut PublishLedger,
    ledger_path: &Utf8Path,
) -> Result<PublishOutcome> {
    let name = destination.name();
    let artifact = signed.artifact_name();
    if ledger.contains(artifact, digest, &name) {
        info!("{artifact} already published to {name}");
        return Ok(PublishOutcome::AlreadyPublished);
    }
    match destination.transfer(signed) {
        Ok(()) => {
            ledger.record(artifact, digest, &name);
            ledger.save(ledger_path)?;
            info!("published {artifact} to {name}");
            Ok(PublishOutcome::Transferred)
        }
        Err(err) => {
            warn!("{err}");
            Ok(PublishOutcome::Failed(err))
        }
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
