//! Release announcements from `$NAME` templates.
//!
//! A placeholder is `$` followed by an uppercase letter and then any run of
//! uppercase letters, digits and underscores. Any other `$` is literal text.

use crate::error::ValidationError;
use crate::release::version::Version;
use std::collections::BTreeMap;

/// Values available to a template, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders(BTreeMap<String, String>);

impl Placeholders {
    /// Empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply `value` for `$name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Values for a release announcement: `$PROJECT`, `$VERSION` and, when
    /// known, `$URL`.
    #[must_use]
    pub fn for_release(project: &str, version: &Version, url: Option<&str>) -> Self {
        let values = Self::new()
            .with("PROJECT", project)
            .with("VERSION", version.as_str());
        match url {
            Some(url) => values.with("URL", url),
            None => values,
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Substitute every placeholder in `template`.
///
/// # Errors
///
/// Returns [`ValidationError::MissingPlaceholder`] for the first placeholder
/// with no supplied value.
///
/// # Examples
///
/// ```
/// use relpipe::announce::{Placeholders, render};
///
/// let values = Placeholders::new()
///     .with("VERSION", "2.3")
///     .with("URL", "https://example.org/changelog");
/// let text = render("$VERSION released, see $URL", &values)?;
/// assert_eq!(text, "2.3 released, see https://example.org/changelog");
/// # Ok::<(), relpipe::error::ValidationError>(())
/// ```
pub fn render(template: &str, values: &Placeholders) -> Result<String, ValidationError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(dollar) = rest.find('$') {
        let (literal, tail) = rest.split_at(dollar);
        out.push_str(literal);
        let after = tail.strip_prefix('$').unwrap_or(tail);
        let name_len = placeholder_len(after);
        if name_len == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        let (name, remainder) = after.split_at(name_len);
        let value = values
            .get(name)
            .ok_or_else(|| ValidationError::MissingPlaceholder {
                name: name.to_owned(),
            })?;
        out.push_str(value);
        rest = remainder;
    }
    out.push_str(rest);
    Ok(out)
}

/// Length of the placeholder name at the start of `text`, or zero.
fn placeholder_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_uppercase() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_'))
        .map_or(text.len(), |(idx, _)| idx)
}
