//! Detached, ASCII-armored signatures over release artifacts.
//!
//! Key material never passes through this crate: [`GpgSigner`] delegates to
//! gpg, which may prompt for a passphrase. Tests substitute a deterministic
//! signer through the [`Signer`] trait.

use super::naming::SIGNATURE_EXTENSION;
use crate::error::{ReleaseError, Result};
use crate::exec::{CommandExecutor, failure_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// An artifact bound to its detached signature.
///
/// The binding is one to one: changing the artifact invalidates the
/// signature, and there is no way to re-sign only part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    /// Path of the signed artifact.
    pub artifact: Utf8PathBuf,
    /// Path of the detached signature.
    pub signature: Utf8PathBuf,
}

impl SignedArtifact {
    /// Bind `artifact` to the conventional `<artifact>.asc` signature path.
    #[must_use]
    pub fn for_artifact(artifact: &Utf8Path) -> Self {
        Self {
            artifact: artifact.to_owned(),
            signature: Utf8PathBuf::from(format!("{artifact}{SIGNATURE_EXTENSION}")),
        }
    }

    /// File name of the artifact, used to key publish records.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        self.artifact.file_name().unwrap_or_default()
    }

    /// File name of the signature.
    #[must_use]
    pub fn signature_name(&self) -> &str {
        self.signature.file_name().unwrap_or_default()
    }
}

/// Capability to produce and check detached signatures.
pub trait Signer {
    /// Sign `artifact`, writing the detached signature beside it.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Signing`] if the key is unavailable or the
    /// operation is rejected.
    fn sign(&self, artifact: &Utf8Path) -> Result<SignedArtifact>;

    /// Check that `signed.signature` is valid for `signed.artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Signing`] if the signature does not verify.
    fn verify(&self, signed: &SignedArtifact) -> Result<()>;
}

/// Signs with gpg through a [`CommandExecutor`].
pub struct GpgSigner<'a> {
    executor: &'a dyn CommandExecutor,
    key: Option<String>,
}

impl<'a> GpgSigner<'a> {
    /// Create a signer using gpg's default key, or `key` when given.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, key: Option<String>) -> Self {
        Self { executor, key }
    }

    fn run_gpg(&self, artifact: &Utf8Path, args: &[&str]) -> Result<()> {
        let output = self
            .executor
            .run("gpg", args)
            .map_err(|err| signing_error(artifact, format!("could not run gpg: {err}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(signing_error(artifact, failure_message(&output)))
        }
    }
}

impl Signer for GpgSigner<'_> {
    fn sign(&self, artifact: &Utf8Path) -> Result<SignedArtifact> {
        let signed = SignedArtifact::for_artifact(artifact);

        let mut args = vec!["--yes", "--armor", "--detach-sign"];
        if let Some(key) = &self.key {
            args.extend(["--local-user", key.as_str()]);
        }
        args.extend(["--output", signed.signature.as_str(), artifact.as_str()]);

        debug!("signing {artifact}");
        self.run_gpg(artifact, &args)?;
        info!("wrote signature {}", signed.signature);
        Ok(signed)
    }

    fn verify(&self, signed: &SignedArtifact) -> Result<()> {
        self.run_gpg(
            &signed.artifact,
            &["--verify", signed.signature.as_str(), signed.artifact.as_str()],
        )
    }
}

pub(crate) fn signing_error(artifact: &Utf8Path, reason: impl Into<String>) -> ReleaseError {
    ReleaseError::Signing {
        artifact: artifact.to_owned(),
        reason: reason.into(),
    }
}

#[cfg(any(test, feature = "test-support"))]
mod digest_signer {
    use super::{SignedArtifact, Signer, signing_error};
    use crate::error::Result;
    use crate::release::digest::Sha256Digest;
    use camino::Utf8Path;
    use sha2::{Digest, Sha256};
    use std::fs;

    const BEGIN: &str = "-----BEGIN RELPIPE TEST SIGNATURE-----";
    const END: &str = "-----END RELPIPE TEST SIGNATURE-----";

    /// Deterministic signer that needs no key material.
    ///
    /// The signature is an armored SHA-256 over the key id and the artifact
    /// bytes, so it verifies only against the exact bytes that were signed.
    #[derive(Debug, Clone)]
    pub struct DigestSigner {
        key_id: String,
    }

    impl DigestSigner {
        /// Create a signer for the named fake key.
        #[must_use]
        pub fn new(key_id: impl Into<String>) -> Self {
            Self {
                key_id: key_id.into(),
            }
        }

        fn digest(&self, artifact: &Utf8Path) -> Result<Sha256Digest> {
            let bytes = fs::read(artifact)
                .map_err(|e| signing_error(artifact, format!("cannot read artifact: {e}")))?;
            let mut hasher = Sha256::new();
            hasher.update(self.key_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
            Ok(Sha256Digest::from_hasher(hasher))
        }
    }

    impl Signer for DigestSigner {
        fn sign(&self, artifact: &Utf8Path) -> Result<SignedArtifact> {
            let signed = SignedArtifact::for_artifact(artifact);
            let digest = self.digest(artifact)?;
            let armored = format!("{BEGIN}\nKey: {}\n\n{digest}\n{END}\n", self.key_id);
            fs::write(&signed.signature, armored)?;
            Ok(signed)
        }

        fn verify(&self, signed: &SignedArtifact) -> Result<()> {
            let armored = fs::read_to_string(&signed.signature).map_err(|e| {
                signing_error(&signed.artifact, format!("cannot read signature: {e}"))
            })?;
            let recorded = armored
                .lines()
                .skip_while(|line| !line.is_empty())
                .find(|line| !line.is_empty() && *line != END)
                .ok_or_else(|| signing_error(&signed.artifact, "malformed signature"))?;
            let expected = self.digest(&signed.artifact)?;
            if recorded == expected.as_str() {
                Ok(())
            } else {
                Err(signing_error(
                    &signed.artifact,
                    "signature does not match artifact",
                ))
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use digest_signer::DigestSigner;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn artifact(dir: &TempDir, contents: &[u8]) -> Utf8PathBuf {
        let path = Utf8Path::from_path(dir.path())
            .expect("non-UTF8 temp path")
            .join("proj-1.0.0.tar.bz2");
        fs::write(&path, contents).expect("write artifact");
        path
    }

    #[rstest]
    fn signature_path_appends_asc() {
        let signed = SignedArtifact::for_artifact(Utf8Path::new("dist/proj-1.0.0.tar.bz2"));
        assert_eq!(signed.signature, "dist/proj-1.0.0.tar.bz2.asc");
        assert_eq!(signed.artifact_name(), "proj-1.0.0.tar.bz2");
        assert_eq!(signed.signature_name(), "proj-1.0.0.tar.bz2.asc");
    }

    #[rstest]
    fn digest_signature_verifies_against_signed_bytes() {
        let dir = TempDir::new().expect("temp dir");
        let signer = DigestSigner::new("release-key");
        let signed = signer.sign(&artifact(&dir, b"artifact A")).expect("sign");

        signer.verify(&signed).expect("verifies");
    }

    #[rstest]
    fn digest_signature_fails_after_artifact_changes() {
        let dir = TempDir::new().expect("temp dir");
        let signer = DigestSigner::new("release-key");
        let path = artifact(&dir, b"artifact A");
        let signed = signer.sign(&path).expect("sign");

        fs::write(&path, b"artifact B").expect("tamper");
        let err = signer.verify(&signed).expect_err("tampered artifact");
        assert!(matches!(err, ReleaseError::Signing { .. }));
    }

    #[rstest]
    fn digest_signature_depends_on_key() {
        let dir = TempDir::new().expect("temp dir");
        let signed = DigestSigner::new("key-one")
            .sign(&artifact(&dir, b"artifact A"))
            .expect("sign");

        assert!(DigestSigner::new("key-two").verify(&signed).is_err());
    }

    #[rstest]
    fn gpg_signs_with_configured_key() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "gpg",
            [
                "--yes",
                "--armor",
                "--detach-sign",
                "--local-user",
                "0xABCD",
                "--output",
                "dist/p-1.tar.bz2.asc",
                "dist/p-1.tar.bz2",
            ],
            success_output(),
        )]);
        let signer = GpgSigner::new(&executor, Some("0xABCD".to_owned()));

        let signed = signer.sign(Utf8Path::new("dist/p-1.tar.bz2")).expect("sign");
        assert_eq!(signed.signature, "dist/p-1.tar.bz2.asc");
        executor.assert_finished();
    }

    #[rstest]
    fn gpg_rejection_is_a_signing_error() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "gpg",
            [
                "--yes",
                "--armor",
                "--detach-sign",
                "--output",
                "p-1.tar.bz2.asc",
                "p-1.tar.bz2",
            ],
            failure_output("gpg: signing failed: Bad passphrase"),
        )]);
        let signer = GpgSigner::new(&executor, None);

        let err = signer.sign(Utf8Path::new("p-1.tar.bz2")).expect_err("rejected");
        assert!(err.to_string().contains("Bad passphrase"));
    }

    #[rstest]
    fn gpg_verify_passes_signature_then_artifact() {
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "gpg",
            ["--verify", "p-1.tar.bz2.asc", "p-1.tar.bz2"],
            success_output(),
        )]);
        let signer = GpgSigner::new(&executor, None);

        signer
            .verify(&SignedArtifact::for_artifact(Utf8Path::new("p-1.tar.bz2")))
            .expect("verifies");
    }
}
