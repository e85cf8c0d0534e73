//! Git operations behind an explicit repository handle.
//!
//! [`GitRepository`] pairs a checkout root with a [`CommandExecutor`], and
//! every invocation is issued as `git -C <root> ...`, so no stage depends on
//! the process working directory.

use crate::error::{ReleaseError, Result, ValidationError};
use crate::exec::{CommandExecutor, failure_message};
use crate::release::archive::{EntryKind, ResolvedTree, TreeEntry, TreeSource};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::process::Output;

/// Mode git reports for regular files.
const MODE_FILE: &str = "100644";
/// Mode git reports for executable files.
const MODE_EXECUTABLE: &str = "100755";
/// Mode git reports for symbolic links.
const MODE_SYMLINK: &str = "120000";
/// Mode git reports for submodule commits.
const MODE_GITLINK: &str = "160000";

/// A git checkout reached through a command executor.
pub struct GitRepository<'a> {
    executor: &'a dyn CommandExecutor,
    root: Utf8PathBuf,
}

impl<'a> GitRepository<'a> {
    /// Create a handle for the checkout at `root`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            executor,
            root: root.into(),
        }
    }

    /// The checkout root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolve `reference` to a full commit id.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::InvalidReference`] if the reference does not
    /// name a commit.
    pub fn resolve_commit(&self, reference: &str) -> Result<String> {
        let spec = format!("{reference}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &spec])?;
        let commit = stdout_line(&output);
        if !output.status.success() || commit.is_empty() {
            return Err(ReleaseError::InvalidReference {
                reference: reference.to_owned(),
            });
        }
        Ok(commit)
    }

    /// Whether `reference` names a tag.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be spawned.
    pub fn is_tag(&self, reference: &str) -> Result<bool> {
        let name = format!("refs/tags/{}", tag_name(reference));
        let output = self.git(&["rev-parse", "--verify", "--quiet", &name])?;
        Ok(output.status.success())
    }

    /// Describe `reference` using the nearest tag, or the abbreviated commit
    /// id when no tag is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Git`] if `git describe` fails.
    pub fn describe(&self, reference: &str) -> Result<String> {
        let output = self.git(&["describe", "--tags", "--always", reference])?;
        check_status(&output, "describe")?;
        Ok(stdout_line(&output))
    }

    /// Committer timestamp of `commit` in seconds since the epoch.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Git`] if the timestamp cannot be read.
    pub fn commit_time(&self, commit: &str) -> Result<u64> {
        let output = self.git(&["show", "-s", "--format=%ct", commit])?;
        check_status(&output, "show")?;
        let text = stdout_line(&output);
        text.parse().map_err(|_| ReleaseError::Git {
            operation: "show",
            message: format!("unexpected commit timestamp \"{text}\""),
        })
    }

    /// Number of non-merge commits reachable from `head` but not from
    /// `base`, matching what `git format-patch` emits.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Git`] if `git rev-list` fails.
    pub fn count_commits(&self, base: &str, head: &str) -> Result<usize> {
        let range = format!("{base}..{head}");
        let output = self.git(&["rev-list", "--count", "--no-merges", &range])?;
        check_status(&output, "rev-list")?;
        let text = stdout_line(&output);
        text.parse().map_err(|_| ReleaseError::Git {
            operation: "rev-list",
            message: format!("unexpected commit count \"{text}\""),
        })
    }

    /// Render `base..head` as an mbox stream, one message per commit, with
    /// rename detection enabled. Diffs keep whatever encoding the files use.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Git`] if `git format-patch` fails.
    pub fn format_patch_stream(&self, base: &str, head: &str) -> Result<Vec<u8>> {
        let range = format!("{base}..{head}");
        let output = self.git(&[
            "format-patch",
            "-M",
            "--stdout",
            "--no-signature",
            "--numbered",
            &range,
        ])?;
        check_status(&output, "format-patch")?;
        Ok(output.stdout)
    }

    /// Create and check out `branch` starting at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBranchName`] for blank names,
    /// [`ReleaseError::InvalidReference`] if `base` does not resolve, or
    /// [`ReleaseError::Git`] if the checkout fails.
    pub fn create_branch(&self, branch: &str, base: &str) -> Result<()> {
        if branch.trim().is_empty() || branch.starts_with('-') {
            return Err(ValidationError::InvalidBranchName {
                value: branch.to_owned(),
            }
            .into());
        }
        self.resolve_commit(base)?;
        let output = self.git(&["checkout", "-b", branch, base])?;
        check_status(&output, "checkout")
    }

    /// Read the blob `object` as raw bytes.
    fn read_blob(&self, object: &str) -> Result<Vec<u8>> {
        let output = self.git(&["cat-file", "blob", object])?;
        check_status(&output, "cat-file")?;
        Ok(output.stdout)
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push("-C");
        full.push(self.root.as_str());
        full.extend_from_slice(args);
        self.executor.run("git", &full)
    }
}

impl TreeSource for GitRepository<'_> {
    fn resolve(&self, reference: &str) -> Result<ResolvedTree> {
        let commit = self.resolve_commit(reference).map_err(|err| match err {
            ReleaseError::InvalidReference { reference } => ReleaseError::ReferenceResolution {
                reference,
                reason: "no commit with that name (or the name is ambiguous)".to_owned(),
            },
            other => other,
        })?;
        let timestamp = self.commit_time(&commit)?;
        Ok(ResolvedTree { commit, timestamp })
    }

    fn entries(&self, tree: &ResolvedTree) -> Result<Vec<TreeEntry>> {
        let output = self.git(&["ls-tree", "-r", "-z", "--full-tree", &tree.commit])?;
        check_status(&output, "ls-tree")?;
        let listing = String::from_utf8(output.stdout).map_err(|e| ReleaseError::Git {
            operation: "ls-tree",
            message: format!("tree listing is not UTF-8: {e}"),
        })?;

        let mut entries = Vec::new();
        for record in listing.split('\0').filter(|r| !r.is_empty()) {
            let listed = parse_ls_tree_record(record)?;
            let kind = match listed.mode {
                MODE_FILE => EntryKind::File,
                MODE_EXECUTABLE => EntryKind::Executable,
                MODE_SYMLINK => EntryKind::Symlink,
                MODE_GITLINK => {
                    warn!("skipping submodule {} in archive", listed.path);
                    continue;
                }
                other => {
                    return Err(ReleaseError::Git {
                        operation: "ls-tree",
                        message: format!("unsupported mode {other} for {}", listed.path),
                    });
                }
            };
            let contents = self.read_blob(listed.object)?;
            entries.push(TreeEntry {
                path: listed.path.to_owned(),
                kind,
                contents,
            });
        }
        debug!("read {} entries from {}", entries.len(), tree.commit);
        Ok(entries)
    }
}

/// Clone `url` into `target`, creating parent directories as needed.
///
/// Uses the executor's networked path, so any configured timeout applies.
///
/// # Errors
///
/// Returns [`ReleaseError::Git`] if the clone fails.
pub fn clone_repository(
    executor: &dyn CommandExecutor,
    url: &str,
    target: &Utf8Path,
) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let output = executor.run_networked("git", &["clone", url, target.as_str()])?;
    check_status(&output, "clone")
}

/// One record of `git ls-tree` output.
struct LsTreeRecord<'r> {
    mode: &'r str,
    object: &'r str,
    path: &'r str,
}

/// Parse `<mode> SP <type> SP <object> TAB <path>`.
fn parse_ls_tree_record(record: &str) -> Result<LsTreeRecord<'_>> {
    let malformed = || ReleaseError::Git {
        operation: "ls-tree",
        message: format!("malformed tree record \"{record}\""),
    };
    let (meta, path) = record.split_once('\t').ok_or_else(malformed)?;
    let mut fields = meta.split(' ');
    let mode = fields.next().ok_or_else(malformed)?;
    let _kind = fields.next().ok_or_else(malformed)?;
    let object = fields.next().ok_or_else(malformed)?;
    Ok(LsTreeRecord { mode, object, path })
}

/// `reference` without a leading `refs/tags/`.
#[must_use]
pub fn tag_name(reference: &str) -> &str {
    reference.strip_prefix("refs/tags/").unwrap_or(reference)
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_owned()
}

fn check_status(output: &Output, operation: &'static str) -> Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(ReleaseError::Git {
            operation,
            message: failure_message(output),
        })
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
