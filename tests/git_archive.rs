//! Archive and patch generation against a real git repository.
//!
//! Skipped when `git` is not installed.

use camino::{Utf8Path, Utf8PathBuf};
use relpipe::exec::SystemCommandExecutor;
use relpipe::git::GitRepository;
use relpipe::patches::PatchSeriesGenerator;
use relpipe::release::archive::{ArchiveSpec, build_archive};
use relpipe::release::compress::compress;
use relpipe::release::inventory::list_entries;
use relpipe::release::version::resolve_version;
use rstest::{fixture, rstest};
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

fn git(root: &Utf8Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "user.name=Release Bot", "-c", "user.email=bot@example.org"])
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .args(args)
        .env("GIT_AUTHOR_DATE", "2024-10-01T12:00:00Z")
        .env("GIT_COMMITTER_DATE", "2024-10-01T12:00:00Z")
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

struct Repo {
    dir: TempDir,
}

impl Repo {
    fn base(&self) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.dir.path().to_path_buf()).expect("non-UTF8 temp path")
    }

    fn root(&self) -> Utf8PathBuf {
        self.base().join("repo")
    }

    /// Commit `contents` to `path` on a new `topic` branch.
    fn topic_commit(&self, path: &str, contents: &[u8], message: &str) {
        let root = self.root();
        git(&root, &["checkout", "--quiet", "-B", "topic"]);
        fs::write(root.join(path), contents).expect("write");
        git(&root, &["add", path]);
        git(&root, &["commit", "--quiet", "-m", message]);
    }
}

#[fixture]
fn repo() -> Option<Repo> {
    if !git_available() {
        return None;
    }
    let repo = Repo {
        dir: TempDir::new().expect("temp dir"),
    };
    let root = repo.root();
    fs::create_dir_all(root.join("tests/data")).expect("mkdir");
    git(&root, &["init", "--quiet", "--initial-branch=master"]);
    fs::write(root.join("README"), "proj\n").expect("write");
    fs::write(root.join("tests/data/test1.tar"), [0u8; 512]).expect("write");
    git(&root, &["add", "."]);
    git(&root, &["commit", "--quiet", "-m", "Initial import"]);
    git(&root, &["tag", "v1.0.0"]);
    Some(repo)
}

#[rstest]
fn archive_of_a_tag_is_reproducible(repo: Option<Repo>) {
    let Some(repo) = repo else { return };
    let executor = SystemCommandExecutor::default();
    let git_repo = GitRepository::new(&executor, repo.root());

    let version = resolve_version(&git_repo, "v1.0.0").expect("version");
    assert_eq!(version.as_str(), "1.0.0");

    let out = repo.base().join("dist");
    let build = |name: &str| {
        let spec = ArchiveSpec {
            reference: "v1.0.0".to_owned(),
            prefix: "proj-1.0.0/".to_owned(),
            output: out.join(name),
        };
        build_archive(&git_repo, &spec).expect("archive");
        fs::read(out.join(name)).expect("read archive")
    };
    assert_eq!(build("first.tar"), build("second.tar"));

    let artifact = compress(&out.join("first.tar")).expect("compress");
    let entries = list_entries(&artifact).expect("entries");
    assert!(entries.contains("proj-1.0.0/tests/data/test1.tar"));
    assert!(entries.contains("proj-1.0.0/README"));
}

#[rstest]
fn tag_names_its_version_beside_an_annotated_tag(repo: Option<Repo>) {
    let Some(repo) = repo else { return };
    git(
        &repo.root(),
        &["tag", "-a", "debian/1.0.0-1", "-m", "Debian upload"],
    );
    let executor = SystemCommandExecutor::default();
    let git_repo = GitRepository::new(&executor, repo.root());

    let version = resolve_version(&git_repo, "v1.0.0").expect("version");
    assert_eq!(version.as_str(), "1.0.0");
}

#[rstest]
fn patch_series_from_a_branch(repo: Option<Repo>) {
    let Some(repo) = repo else { return };
    repo.topic_commit("README", b"proj\nmore\n", "Describe the project");

    let executor = SystemCommandExecutor::default();
    let git_repo = GitRepository::new(&executor, repo.root());
    let out = repo.base().join("outgoing");
    let series = PatchSeriesGenerator::new(&git_repo)
        .generate("master", "topic", &out)
        .expect("series");

    assert_eq!(series.len(), 1);
    assert!(out.join("0001-Describe-the-project.patch").is_file());
}

#[rstest]
fn latin1_change_becomes_a_patch(repo: Option<Repo>) {
    let Some(repo) = repo else { return };
    repo.topic_commit("menu.txt", b"caf\xe9\n", "Add the menu");

    let executor = SystemCommandExecutor::default();
    let git_repo = GitRepository::new(&executor, repo.root());
    let out = repo.base().join("outgoing");
    let series = PatchSeriesGenerator::new(&git_repo)
        .generate("master", "topic", &out)
        .expect("series");

    assert_eq!(series.len(), 1);
    let patch = fs::read(out.join("0001-Add-the-menu.patch")).expect("read patch");
    assert!(patch.windows(6).any(|line| line == b"+caf\xe9\n"));
}

#[rstest]
fn renamed_file_is_sent_as_a_rename(repo: Option<Repo>) {
    let Some(repo) = repo else { return };
    let root = repo.root();
    git(&root, &["checkout", "--quiet", "-b", "topic"]);
    git(&root, &["mv", "tests/data/test1.tar", "tests/data/empty.tar"]);
    git(&root, &["commit", "--quiet", "-m", "Rename the tar fixture"]);

    let executor = SystemCommandExecutor::default();
    let git_repo = GitRepository::new(&executor, repo.root());
    let out = repo.base().join("outgoing");
    let generate = || {
        let series = PatchSeriesGenerator::new(&git_repo)
            .generate("master", "topic", &out)
            .expect("series");
        let [patch] = series.files.as_slice() else {
            panic!("expected one patch, got {}", series.len());
        };
        fs::read_to_string(patch).expect("read patch")
    };

    let first = generate();
    assert!(first.contains("rename from tests/data/test1.tar\n"));
    assert!(first.contains("rename to tests/data/empty.tar\n"));
    assert!(first.contains("similarity index 100%"));
    assert_eq!(first, generate());
}
