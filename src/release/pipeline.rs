//! Release pipeline orchestration.
//!
//! Runs the release stages in order: archive the tree, compress it, check
//! the inventory, sign, and optionally publish. Each stage consumes the
//! previous stage's output and any failure stops the run.

use super::archive::{ArchiveSpec, TreeSource, build_archive};
use super::compress::compress;
use super::digest::Sha256Digest;
use super::inventory::check_required_paths;
use super::naming::ReleaseName;
use super::publish::{PublishReport, Publisher};
use super::signing::{SignedArtifact, Signer};
use super::version::Version;
use crate::error::Result;
use camino::Utf8Path;
use log::{debug, info};
use std::fs;

/// Context for a release pipeline run.
pub struct ReleaseContext<'a> {
    /// Source of the tree being released.
    pub source: &'a dyn TreeSource,
    /// Signer for the compressed artifact.
    pub signer: &'a dyn Signer,
    /// Directory that receives the artifact and its signature.
    pub output_dir: &'a Utf8Path,
    /// Paths that must be present in the archive.
    pub required_paths: &'a [String],
}

/// Everything a completed release produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutput {
    /// Artifact naming for this release.
    pub name: ReleaseName,
    /// Commit the archive was built from.
    pub commit: String,
    /// The compressed artifact and its signature.
    pub artifact: SignedArtifact,
    /// Digest of the compressed artifact.
    pub digest: Sha256Digest,
    /// Publish outcomes, when publishing was requested.
    pub publish: Option<PublishReport>,
}

/// Build, compress, check and sign the release of `reference` as
/// `project` at `version`, then publish it when `publisher` is given.
///
/// The intermediate `.tar` is removed once the compressed artifact exists.
///
/// # Errors
///
/// Returns the first stage failure. Publish failures are reported in
/// [`ReleaseOutput::publish`] rather than as an error so that the caller
/// can decide how to surface a partial publish.
pub fn run_release(
    context: &ReleaseContext<'_>,
    reference: &str,
    project: &str,
    version: Version,
    publisher: Option<&Publisher<'_>>,
) -> Result<ReleaseOutput> {
    let name = ReleaseName::new(project, version);
    info!("releasing {name} from {reference}");

    let spec = ArchiveSpec {
        reference: reference.to_owned(),
        prefix: name.prefix(),
        output: context.output_dir.join(name.archive_filename()),
    };
    let archive = build_archive(context.source, &spec)?;
    debug!("archived {} files from {}", archive.file_count, archive.commit);

    let compressed = compress(&archive.path)?;
    fs::remove_file(&archive.path)?;

    check_required_paths(&compressed, &spec.prefix, context.required_paths)?;

    let artifact = context.signer.sign(&compressed)?;
    let digest = Sha256Digest::of_file(&artifact.artifact)?;
    info!("{} sha256 {digest}", artifact.artifact_name());

    let publish = publisher.map(|p| p.publish(&artifact)).transpose()?;

    Ok(ReleaseOutput {
        name,
        commit: archive.commit,
        artifact,
        digest,
        publish,
    })
}
