//! Repository lookups the aggregators depend on.
//!
//! Aggregators only see these traits, so they can run against a real
//! repository ([`GitRepository`](crate::mining::GitRepository)) or an
//! in-memory stand-in in tests.

use strata_core::StrataError;

/// Historic file content and diffs, addressed by revision.
pub trait ContentSource {
    /// Full text of `path` as of `sha`, or `None` if the file does not
    /// exist there (or is not valid UTF-8).
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the revision cannot be read.
    fn file_at(&self, sha: &str, path: &str) -> Result<Option<String>, StrataError>;

    /// Unified diff from `from` to `to`, optionally restricted to one path.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if either revision cannot be read.
    fn diff_between(&self, from: &str, to: &str, path: Option<&str>) -> Result<String, StrataError>;
}

/// Code line counts at a revision.
pub trait LineCounter {
    /// Non-blank, non-comment lines of `path` at `sha`, or `None` if the
    /// file does not exist there.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the revision cannot be read.
    fn line_count(&self, sha: &str, path: &str) -> Result<Option<u64>, StrataError>;
}

/// Count code lines by reading `path` through `source`.
pub fn count_lines_via<S: ContentSource + ?Sized>(
    source: &S,
    sha: &str,
    path: &str,
) -> Result<Option<u64>, StrataError> {
    Ok(source
        .file_at(sha, path)?
        .map(|text| strata_difflens::complexity::count_code_lines(&text)))
}
