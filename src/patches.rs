//! Patch series generation for upstream submission.
//!
//! A series is the ordered set of commits on a branch beyond its base,
//! rendered one file per commit as `NNNN-<subject-slug>.patch`. Generating
//! a series replaces any `.patch` files already in the output directory, so
//! repeating it after amending the branch leaves exactly the new set.

use crate::error::{ReleaseError, Result};
use crate::git::GitRepository;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs;

/// Longest subject slug used in a patch file name.
const MAX_SLUG_LEN: usize = 52;

/// Extension of generated patch files.
const PATCH_EXTENSION: &str = "patch";

/// Fixed date git writes on every mbox separator line.
const MBOX_SEPARATOR_DATE: &[u8] = b" Mon Sep 17 00:00:00 2001";

/// Patch files written for a series, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSeries {
    /// Paths of the written files, numbered from `0001`.
    pub files: Vec<Utf8PathBuf>,
}

impl PatchSeries {
    /// Number of patches in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the series holds no patches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Generates patch series from a repository.
pub struct PatchSeriesGenerator<'r> {
    repo: &'r GitRepository<'r>,
}

impl<'r> PatchSeriesGenerator<'r> {
    /// Create a generator for `repo`.
    #[must_use]
    pub fn new(repo: &'r GitRepository<'r>) -> Self {
        Self { repo }
    }

    /// Write one patch per commit in `base..head` into `output_dir`.
    ///
    /// Patch bodies are written byte for byte, so diffs of files in any
    /// encoding survive unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::NoCommitsAhead`] when `head` has no commits
    /// beyond `base`, [`ReleaseError::Git`] if git fails or produces a
    /// different number of patches than commits, or an I/O error if the
    /// files cannot be written.
    pub fn generate(&self, base: &str, head: &str, output_dir: &Utf8Path) -> Result<PatchSeries> {
        let expected = self.repo.count_commits(base, head)?;
        if expected == 0 {
            return Err(ReleaseError::NoCommitsAhead {
                base: base.to_owned(),
                head: head.to_owned(),
            });
        }
        debug!("{expected} commits on {head} ahead of {base}");

        let stream = self.repo.format_patch_stream(base, head)?;
        let messages = split_mbox(&stream);
        if messages.len() != expected {
            return Err(ReleaseError::Git {
                operation: "format-patch",
                message: format!(
                    "expected {expected} patches but format-patch produced {}",
                    messages.len()
                ),
            });
        }

        fs::create_dir_all(output_dir)?;
        remove_existing_patches(output_dir)?;

        let mut files = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let slug = subject_slug(&message_subject(message));
            let path = output_dir.join(format!("{:04}-{slug}.{PATCH_EXTENSION}", index + 1));
            fs::write(&path, message)?;
            debug!("wrote {path}");
            files.push(path);
        }
        info!("wrote {} patches to {output_dir}", files.len());
        Ok(PatchSeries { files })
    }
}

fn remove_existing_patches(dir: &Utf8Path) -> Result<()> {
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        let path = entry.path();
        if path.extension() == Some(PATCH_EXTENSION) && path.is_file() {
            debug!("removing stale {path}");
            fs::remove_file(path)?;
        }
    }
    Ok(())
}

/// True for `From <40 hex digits> Mon Sep 17 00:00:00 2001`.
fn is_separator(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(b"From ") else {
        return false;
    };
    let Some((sha, date)) = rest.split_at_checked(40) else {
        return false;
    };
    sha.iter().all(u8::is_ascii_hexdigit) && date.trim_ascii_end() == MBOX_SEPARATOR_DATE
}

/// Split a `format-patch --stdout` stream into messages, keeping each
/// message's separator line.
fn split_mbox(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut messages: Vec<Vec<u8>> = Vec::new();
    for line in stream.split_inclusive(|b| *b == b'\n') {
        if is_separator(line) {
            messages.push(Vec::new());
        }
        if let Some(current) = messages.last_mut() {
            current.extend_from_slice(line);
        }
    }
    messages
}

/// Header block of `message`: the lines after the separator up to the first
/// blank line. Headers are ASCII in practice, so decoding is lossy.
fn header_block(message: &[u8]) -> String {
    let end = message
        .windows(2)
        .position(|pair| pair == b"\n\n")
        .map_or(message.len(), |at| at + 1);
    String::from_utf8_lossy(message.get(..end).unwrap_or(message)).into_owned()
}

/// The unfolded, decoded `Subject:` header with any `[PATCH ...]` tag
/// removed.
fn message_subject(message: &[u8]) -> String {
    let headers = header_block(message);
    let mut subject: Option<String> = None;
    for line in headers.lines().skip(1) {
        if line.trim_end().is_empty() {
            break;
        }
        match subject.as_mut() {
            Some(text) if line.starts_with([' ', '\t']) => text.push_str(line.trim_end()),
            Some(_) => break,
            None => {
                if let Some(value) = line.strip_prefix("Subject:") {
                    subject = Some(value.trim_end().to_owned());
                }
            }
        }
    }
    let decoded = decode_encoded_words(subject.unwrap_or_default().trim());
    strip_patch_tag(&decoded).to_owned()
}

fn strip_patch_tag(subject: &str) -> &str {
    subject
        .strip_prefix("[PATCH")
        .and_then(|rest| rest.split_once(']'))
        .map_or(subject, |(_, after)| after.trim_start())
}

/// Decode RFC 2047 `=?charset?q?...?=` words as written by git for
/// non-ASCII subjects. Whitespace between adjacent encoded words is dropped.
fn decode_encoded_words(text: &str) -> String {
    let mut bytes = Vec::with_capacity(text.len());
    let mut rest = text;
    let mut previous_was_encoded = false;
    while !rest.is_empty() {
        let gap_len = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        let (gap, after_gap) = rest.split_at(gap_len);
        let word_len = after_gap.find(char::is_whitespace).unwrap_or(after_gap.len());
        let (word, after_word) = after_gap.split_at(word_len);

        let decoded = decode_q_word(word);
        if !(previous_was_encoded && decoded.is_some()) {
            bytes.extend_from_slice(gap.as_bytes());
        }
        previous_was_encoded = decoded.is_some();
        match decoded {
            Some(raw) => bytes.extend(raw),
            None => bytes.extend_from_slice(word.as_bytes()),
        }
        rest = after_word;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn decode_q_word(word: &str) -> Option<Vec<u8>> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let _charset = parts.next()?;
    let encoding = parts.next()?;
    let payload = parts.next()?;
    if !encoding.eq_ignore_ascii_case("q") {
        return None;
    }
    let mut out = Vec::with_capacity(payload.len());
    let mut input = payload.bytes();
    while let Some(byte) = input.next() {
        match byte {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = [input.next()?, input.next()?];
                let text = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(text, 16).ok()?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// File-name slug for a commit subject, following git's convention.
///
/// Characters other than ASCII letters, digits, `.` and `_` separate words;
/// each run of separators becomes a single `-`, runs of `.` collapse, and
/// leading or trailing `-` and `.` are dropped.
#[must_use]
pub fn subject_slug(subject: &str) -> String {
    let mut slug = String::with_capacity(subject.len());
    let mut pending_dash = false;
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            if !(c == '.' && slug.ends_with('.')) {
                slug.push(c);
            }
        } else {
            pending_dash = true;
        }
    }
    let trimmed = slug.trim_matches(['-', '.']);
    let truncated = trimmed.get(..MAX_SLUG_LEN).unwrap_or(trimmed);
    truncated.trim_end_matches(['-', '.']).to_owned()
}
