//! `relpipe` CLI entrypoint.
//!
//! Loads configuration, installs the logger and dispatches to one release
//! or patch-workflow stage per subcommand.

use camino::Utf8Path;
use clap::Parser;
use relpipe::announce::{Placeholders, render};
use relpipe::bug_report::BugReport;
use relpipe::cli::{
    AnnounceArgs, ArchiveArgs, BugReportArgs, CheckArgs, Cli, Command, ReleaseArgs, SignatureArgs,
};
use relpipe::config::{CONFIG_FILE_NAME, ReleaseConfig};
use relpipe::error::{ReleaseError, Result, ValidationError};
use relpipe::exec::{CommandExecutor, SystemCommandExecutor};
use relpipe::git::{GitRepository, clone_repository};
use relpipe::patches::PatchSeriesGenerator;
use relpipe::release::archive::{ArchiveSpec, build_archive};
use relpipe::release::inventory::check_required_paths;
use relpipe::release::naming::{ReleaseName, prefix_for_artifact};
use relpipe::release::pipeline::{ReleaseContext, run_release};
use relpipe::release::publish::{EscrowHost, PackageIndex, PublishOutcome, PublishReport, Publisher};
use relpipe::release::signing::{GpgSigner, SignedArtifact, Signer};
use relpipe::release::version::{Version, resolve_version};
use std::io::Write;

struct RunContext<'a> {
    config: &'a ReleaseConfig,
    config_path: &'a Utf8Path,
    executor: &'a dyn CommandExecutor,
    repo: &'a GitRepository<'a>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level());
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Installs `env_logger` at `level`; `RUST_LOG` takes precedence.
fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let config = ReleaseConfig::discover(cli.config.as_deref())?;
    let executor = SystemCommandExecutor::with_network_timeout(config.network_timeout());
    let repo = GitRepository::new(&executor, config.repository.clone());
    let context = RunContext {
        config: &config,
        config_path: cli
            .config
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new(CONFIG_FILE_NAME)),
        executor: &executor,
        repo: &repo,
    };

    match &cli.command {
        Command::Version(args) => {
            let version = resolve_version(&repo, &args.reference)?;
            write_line(out, version)
        }
        Command::Archive(args) => run_archive(&context, args, out),
        Command::Sign(args) => {
            let signed = signer(&context).sign(&args.artifact)?;
            write_line(out, signed.signature)
        }
        Command::Verify(args) => {
            signer(&context).verify(&signed_artifact(args))?;
            write_line(out, format!("{}: signature verified", args.artifact))
        }
        Command::Publish(args) => run_publish(&context, args, out),
        Command::Release(args) => run_full_release(&context, args, out),
        Command::Check(args) => run_check(&context, args, out),
        Command::Announce(args) => run_announce(&context, args, out),
        Command::Clone(args) => clone_repository(context.executor, &args.url, &args.dest),
        Command::Branch(args) => repo.create_branch(&args.name, &args.base),
        Command::Patches(args) => {
            let series =
                PatchSeriesGenerator::new(&repo).generate(&args.base, &args.head, &args.output_dir)?;
            for file in &series.files {
                write_line(out, file)?;
            }
            Ok(())
        }
        Command::BugReport(args) => run_bug_report(&context, args, out),
    }
}

fn signer<'a>(context: &RunContext<'a>) -> GpgSigner<'a> {
    GpgSigner::new(context.executor, context.config.signing.key.clone())
}

fn signed_artifact(args: &SignatureArgs) -> SignedArtifact {
    let mut signed = SignedArtifact::for_artifact(&args.artifact);
    if let Some(signature) = &args.signature {
        signed.signature = signature.clone();
    }
    signed
}

fn run_archive(context: &RunContext<'_>, args: &ArchiveArgs, out: &mut dyn Write) -> Result<()> {
    let version = resolve_version(context.repo, &args.reference)?;
    let name = ReleaseName::new(context.config.project.as_str(), version);
    let output_dir = args
        .output_dir
        .as_deref()
        .unwrap_or(context.config.output_dir.as_path());
    let spec = ArchiveSpec {
        reference: args.reference.clone(),
        prefix: name.prefix(),
        output: output_dir.join(name.archive_filename()),
    };
    let archive = build_archive(context.repo, &spec)?;
    write_line(out, archive.path)
}

/// The configured escrow host and package index.
fn destinations<'a>(context: &RunContext<'a>) -> Result<(EscrowHost<'a>, PackageIndex<'a>)> {
    let missing = |section: &str| ReleaseError::Config {
        path: context.config_path.to_owned(),
        reason: format!("no [{section}] destination configured"),
    };
    let escrow = context
        .config
        .escrow
        .as_ref()
        .ok_or_else(|| missing("escrow"))?;
    let index = context
        .config
        .package_index
        .as_ref()
        .ok_or_else(|| missing("package_index"))?;
    Ok((
        EscrowHost::new(context.executor, escrow.destination.as_str()),
        PackageIndex::new(context.executor, index.program.as_str(), index.args.clone()),
    ))
}

fn run_publish(context: &RunContext<'_>, args: &SignatureArgs, out: &mut dyn Write) -> Result<()> {
    let (escrow, index) = destinations(context)?;
    let report = Publisher::new(&escrow, &index).publish(&signed_artifact(args))?;
    write_report(out, &report)?;
    report.into_result().map(|_| ())
}

fn run_full_release(
    context: &RunContext<'_>,
    args: &ReleaseArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let targets = if args.skip_publish {
        None
    } else {
        Some(destinations(context)?)
    };
    let publisher = targets
        .as_ref()
        .map(|(escrow, index)| Publisher::new(escrow, index));

    let version = resolve_version(context.repo, &args.reference)?;
    let output_dir = args
        .output_dir
        .as_deref()
        .unwrap_or(context.config.output_dir.as_path());
    let gpg = signer(context);
    let release_context = ReleaseContext {
        source: context.repo,
        signer: &gpg,
        output_dir,
        required_paths: &context.config.required_paths,
    };
    let output = run_release(
        &release_context,
        &args.reference,
        &context.config.project,
        version,
        publisher.as_ref(),
    )?;

    write_line(out, &output.artifact.artifact)?;
    write_line(out, &output.artifact.signature)?;
    write_line(out, format!("sha256 {}", output.digest))?;
    match output.publish {
        Some(report) => {
            write_report(out, &report)?;
            report.into_result().map(|_| ())
        }
        None => Ok(()),
    }
}

fn run_check(context: &RunContext<'_>, args: &CheckArgs, out: &mut dyn Write) -> Result<()> {
    let prefix = match &args.prefix {
        Some(prefix) => prefix.clone(),
        None => {
            let file_name = args.artifact.file_name().unwrap_or_default();
            prefix_for_artifact(file_name).ok_or_else(|| ValidationError::InvalidPrefix {
                value: file_name.to_owned(),
                reason: "cannot derive a prefix from the artifact name; pass --prefix".to_owned(),
            })?
        }
    };
    let required = &context.config.required_paths;
    check_required_paths(&args.artifact, &prefix, required)?;
    write_line(
        out,
        format!("{}: {} required paths present", args.artifact, required.len()),
    )
}

fn run_announce(context: &RunContext<'_>, args: &AnnounceArgs, out: &mut dyn Write) -> Result<()> {
    let version = Version::try_from(args.version.as_str())?;
    let url = match (&args.url, &context.config.changelog_url) {
        (Some(url), _) => Some(url.clone()),
        (None, Some(pattern)) => Some(render(
            pattern,
            &Placeholders::new().with("VERSION", version.as_str()),
        )?),
        (None, None) => None,
    };
    let template = match &args.template {
        Some(path) => std::fs::read_to_string(path)?,
        None => context.config.announcement_template().to_owned(),
    };
    let values = Placeholders::for_release(&context.config.project, &version, url.as_deref());
    write_line(out, render(&template, &values)?)
}

fn run_bug_report(
    context: &RunContext<'_>,
    args: &BugReportArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let body = match &args.body_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => String::new(),
    };
    let source = args
        .source
        .clone()
        .unwrap_or_else(|| context.config.project.clone());
    let attachments = args.attach.clone();
    let report = BugReport::compose(
        source,
        args.package_version.as_str(),
        &args.severity,
        args.subject.as_str(),
        body,
    )?
    .with_attachments(attachments);
    write!(out, "{report}")?;
    Ok(())
}

fn write_report(out: &mut dyn Write, report: &PublishReport) -> Result<()> {
    for (destination, outcome) in &report.outcomes {
        let status = match outcome {
            PublishOutcome::Transferred => "published".to_owned(),
            PublishOutcome::AlreadyPublished => "already published".to_owned(),
            PublishOutcome::Failed(err) => format!("FAILED ({})", err.message),
        };
        write_line(out, format!("{destination}: {status}"))?;
    }
    Ok(())
}

fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) -> Result<()> {
    writeln!(out, "{message}")?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relpipe::release::publish::TransferError;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = ReleaseError::NoCommitsAhead {
            base: "origin/master".to_owned(),
            head: "HEAD".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert_eq!(stderr_text, "error: no commits on HEAD ahead of origin/master\n");
    }

    #[test]
    fn report_lines_name_each_destination() {
        let report = PublishReport {
            artifact: "p-1.tar.bz2".to_owned(),
            outcomes: vec![
                ("escrow".to_owned(), PublishOutcome::AlreadyPublished),
                (
                    "package-index".to_owned(),
                    PublishOutcome::Failed(TransferError {
                        destination: "package-index".to_owned(),
                        message: "403".to_owned(),
                    }),
                ),
            ],
        };

        let mut out = Vec::new();
        write_report(&mut out, &report).expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "escrow: already published\npackage-index: FAILED (403)\n"
        );
    }

    #[test]
    fn explicit_signature_overrides_default() {
        let args = SignatureArgs {
            artifact: "dist/p-1.tar.bz2".into(),
            signature: Some("elsewhere/p-1.asc".into()),
        };
        let signed = signed_artifact(&args);
        assert_eq!(signed.signature, "elsewhere/p-1.asc");
    }
}
