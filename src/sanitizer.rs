//! Output filename derivation
//!
//! Titles become file base names by:
//!
//! 1. Percent-decoding, sequence by sequence; bytes that are not UTF-8 stay
//!    encoded
//! 2. Replacing every character outside the whitelist with `_`
//! 3. Truncating to [`MAX_FILENAME_CHARS`] characters
//! 4. Stripping leading and trailing dots
//!
//! The whitelist is any Unicode alphanumeric plus [`SAFE_PUNCTUATION`].
//! [`sanitize_filename`] is idempotent: feeding its output back in returns
//! the same name.
//!
//! A [`FilenameRegistry`] lives for one run and hands out base names that are
//! unique within it, ignoring case so that case-insensitive filesystems never
//! merge two articles.
//!
//! # Examples
//!
//! ```rust
//! use article_export_markdown::sanitizer::{sanitize_filename, FilenameRegistry};
//!
//! assert_eq!(sanitize_filename("Hello: World?"), "Hello__World_");
//!
//! let mut registry = FilenameRegistry::new();
//! assert_eq!(registry.claim("post"), "post");
//! assert_eq!(registry.claim("Post"), "Post_2");
//! ```

use std::collections::HashSet;

use tracing::debug;

use crate::converter::decode_text;
use crate::record::ArticleRecord;

/// Longest base name produced, in characters (extension excluded)
pub const MAX_FILENAME_CHARS: usize = 100;

/// Punctuation kept in file names
pub const SAFE_PUNCTUATION: &[char] = &[
    '-', '_', '.', ',', '(', ')', '[', ']', '+', '=', '!', '@', '#', '&', '\'', '~',
];

/// Replacement for characters outside the whitelist
const REPLACEMENT: char = '_';

/// Check whether a character may appear in a file name
pub fn is_safe_char(ch: char) -> bool {
    ch.is_alphanumeric() || SAFE_PUNCTUATION.contains(&ch)
}

/// Derive a filesystem-safe base name from a title
///
/// May return an empty string (blank title, or a title made only of dots);
/// [`base_name`] applies the fallbacks.
pub fn sanitize_filename(title: &str) -> String {
    let decoded = decode_text(title);

    let replaced: String = decoded
        .chars()
        .map(|ch| if is_safe_char(ch) { ch } else { REPLACEMENT })
        .take(MAX_FILENAME_CHARS)
        .collect();

    replaced.trim_matches('.').to_string()
}

/// Base name for an article: sanitized title, else identifier, else position
pub fn base_name(record: &ArticleRecord, index: usize) -> String {
    let name = sanitize_filename(&record.title);
    if !name.is_empty() {
        return name;
    }

    if record.post_id != 0 {
        let name = sanitize_filename(&record.post_id.to_string());
        if !name.is_empty() {
            return name;
        }
    }

    format!("article_{index:03}")
}

/// Run-scoped set of base names already handed out
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    claimed: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base`, or the first free `base_2`, `base_3`, ... variant
    ///
    /// Suffixed names shorten `base` as needed to stay within
    /// [`MAX_FILENAME_CHARS`].
    pub fn claim(&mut self, base: &str) -> String {
        if self.claimed.insert(base.to_lowercase()) {
            return base.to_string();
        }

        let mut counter = 2usize;
        loop {
            let suffix = format!("_{counter}");
            let keep = MAX_FILENAME_CHARS.saturating_sub(suffix.chars().count());
            let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
            if self.claimed.insert(candidate.to_lowercase()) {
                debug!(base, file_name = %candidate, "file name taken, added suffix");
                return candidate;
            }
            counter += 1;
        }
    }

    /// Number of names handed out
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
