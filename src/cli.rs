//! CLI argument definitions for `relpipe`.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary focused on orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Cut, sign and publish releases, and prepare patch submissions.
#[derive(Parser, Debug)]
#[command(name = "relpipe")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build, sign and publish a tagged release:\n",
    "    $ relpipe release v1.0.0\n\n",
    "  Build and sign without uploading:\n",
    "    $ relpipe release v1.0.0 --skip-publish\n\n",
    "  Retry destinations that failed last time:\n",
    "    $ relpipe publish dist/proj-1.0.0.tar.bz2\n\n",
    "  Prepare patches for upstream:\n",
    "    $ relpipe patches --base origin/master --output-dir outgoing\n",
))]
pub struct Cli {
    /// Configuration file [default: ./relpipe.toml when present].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the version a reference resolves to.
    Version(ReferenceArgs),

    /// Write the deterministic tar archive for a reference.
    Archive(ArchiveArgs),

    /// Write a detached signature for an artifact.
    Sign(ArtifactArgs),

    /// Verify an artifact against its detached signature.
    Verify(SignatureArgs),

    /// Upload an artifact and its signature to every destination.
    Publish(SignatureArgs),

    /// Run the full release: archive, compress, check, sign and publish.
    Release(ReleaseArgs),

    /// Check that required paths are present in an artifact.
    Check(CheckArgs),

    /// Render the release announcement.
    Announce(AnnounceArgs),

    /// Clone a repository.
    Clone(CloneArgs),

    /// Create and check out a branch.
    Branch(BranchArgs),

    /// Write a numbered patch series for the commits on a branch.
    Patches(PatchesArgs),

    /// Compose a bug report for the distribution tracker.
    BugReport(BugReportArgs),
}

/// A single repository reference.
#[derive(Args, Debug, Clone)]
pub struct ReferenceArgs {
    /// Tag, branch or commit.
    pub reference: String,
}

/// Arguments for the archive command.
#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Tag, branch or commit to archive.
    pub reference: String,

    /// Directory for the archive [default: from configuration].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,
}

/// A single artifact path.
#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Path of the artifact.
    pub artifact: Utf8PathBuf,
}

/// An artifact and optionally its signature.
#[derive(Args, Debug, Clone)]
pub struct SignatureArgs {
    /// Path of the artifact.
    pub artifact: Utf8PathBuf,

    /// Detached signature [default: <artifact>.asc].
    #[arg(short, long, value_name = "SIG")]
    pub signature: Option<Utf8PathBuf>,
}

/// Arguments for the release command.
#[derive(Args, Debug, Clone)]
pub struct ReleaseArgs {
    /// Tag, branch or commit to release.
    pub reference: String,

    /// Directory for the artifact and signature [default: from configuration].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Stop after signing.
    #[arg(long)]
    pub skip_publish: bool,
}

/// Arguments for the check command.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Path of the `.tar.bz2` artifact.
    pub artifact: Utf8PathBuf,

    /// Archive prefix [default: derived from the artifact name].
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,
}

/// Arguments for the announce command.
#[derive(Args, Debug, Clone)]
pub struct AnnounceArgs {
    /// Released version.
    pub version: String,

    /// Changelog URL [default: from configuration].
    #[arg(long)]
    pub url: Option<String>,

    /// Template file [default: from configuration].
    #[arg(long, value_name = "FILE")]
    pub template: Option<Utf8PathBuf>,
}

/// Arguments for the clone command.
#[derive(Args, Debug, Clone)]
pub struct CloneArgs {
    /// Repository URL.
    pub url: String,

    /// Destination directory.
    pub dest: Utf8PathBuf,
}

/// Arguments for the branch command.
#[derive(Args, Debug, Clone)]
pub struct BranchArgs {
    /// Name of the new branch.
    pub name: String,

    /// Starting point.
    #[arg(long, value_name = "REF", default_value = "HEAD")]
    pub base: String,
}

/// Arguments for the patches command.
#[derive(Args, Debug, Clone)]
pub struct PatchesArgs {
    /// Upstream base of the series.
    #[arg(long, value_name = "REF", default_value = "origin/master")]
    pub base: String,

    /// Tip of the series.
    #[arg(long, value_name = "REF", default_value = "HEAD")]
    pub head: String,

    /// Directory for the patch files.
    #[arg(short, long, value_name = "DIR", default_value = "patches")]
    pub output_dir: Utf8PathBuf,
}

/// Arguments for the bug-report command.
#[derive(Args, Debug, Clone)]
pub struct BugReportArgs {
    /// Version of the affected source package.
    #[arg(long = "version", value_name = "VERSION")]
    pub package_version: String,

    /// One of grave, serious, important, normal, minor, wishlist.
    #[arg(long)]
    pub severity: String,

    /// Subject line.
    #[arg(long)]
    pub subject: String,

    /// Source package name [default: project from configuration].
    #[arg(long)]
    pub source: Option<String>,

    /// File holding the report body [default: empty body].
    #[arg(long, value_name = "FILE")]
    pub body_file: Option<Utf8PathBuf>,

    /// File to list as an attachment (can be repeated).
    #[arg(long, value_name = "FILE")]
    pub attach: Vec<Utf8PathBuf>,
}

impl Cli {
    /// Log level selected by `-v` and `-q`.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
