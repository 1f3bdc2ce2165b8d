//! Log text parsing.
//!
//! Reads the output of
//! `git log --pretty=format:'[%h] [%p] %aN %cd %s' --date=iso --numstat`
//! (optionally with `--summary` for `delete mode` lines) into [`Commit`]
//! records. Parsing never fails as a whole: lines that cannot be understood
//! are logged and skipped.

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

lazy_static! {
    static ref HEADER: Regex = Regex::new(
        r"^'*\[(\w+)\]\s+\[([^\]]*)\]\s+(\w.*\w)\s+(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\s+[+-]\d{4})\s*(.*)$"
    )
    .unwrap();
    static ref NUMSTAT: Regex = Regex::new(r"^(\d+|-)\s+(\d+|-)\s+(\S.*)$").unwrap();
    static ref DELETE_MODE: Regex = Regex::new(r"^\s*delete\s+mode\s+\d{6}\s+(\S.*)$").unwrap();
    static ref BRACE_RENAME: Regex =
        Regex::new(r"^(.*)\{([^{}]*?)\s*=>\s*([^{}]*?)\}(.*)$").unwrap();
}

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// One file touched by a commit.
///
/// # Examples
///
/// ```
/// use strata_pulse::log::Change;
///
/// let change = Change::new("src/{a.c => b.c}", 3, 1);
/// assert_eq!(change.old_filename, "src/a.c");
/// assert_eq!(change.filename, "src/b.c");
/// assert!(change.is_rename());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Name before this commit; empty unless the change is a rename.
    pub old_filename: String,
    /// Name after this commit. Never empty.
    pub filename: String,
    /// Lines added (0 for binary files).
    pub added_lines: u64,
    /// Lines removed (0 for binary files).
    pub removed_lines: u64,
    /// Whether git recorded the file as deleted in this commit.
    #[serde(default)]
    pub removed: bool,
}

impl Change {
    /// Build a change from a numstat path, resolving rename notation.
    pub fn new(path: &str, added_lines: u64, removed_lines: u64) -> Self {
        let (old_filename, filename) = match split_rename(path) {
            Some((old, new)) => (old, new),
            None => (String::new(), path.to_string()),
        };
        Self {
            old_filename,
            filename,
            added_lines,
            removed_lines,
            removed: false,
        }
    }

    /// Whether this change moved the file to a new name.
    pub fn is_rename(&self) -> bool {
        !self.old_filename.is_empty()
    }
}

/// A single revision with its parents and file changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Abbreviated revision id.
    pub sha: String,
    /// Parent ids in the order git reports them; empty for root commits.
    pub parent_shas: Vec<String>,
    /// Child ids. Filled in when a [`CommitGraph`](crate::graph::CommitGraph) is built.
    pub child_shas: Vec<String>,
    /// Commit date with its recorded UTC offset.
    pub creation_time: DateTime<FixedOffset>,
    /// Author name.
    pub author: String,
    /// Subject line.
    pub message: String,
    /// Files touched, in log order.
    pub changes: Vec<Change>,
}

impl Commit {
    /// The change touching `filename` (by its post-commit name), if any.
    pub fn change_to(&self, filename: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.filename == filename)
    }

    /// Whether this commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parent_shas.len() > 1
    }
}

/// Result of [`parse_log`].
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Parsed commits, ascending by creation time.
    pub commits: Vec<Commit>,
    /// Number of header lines that could not be parsed.
    pub skipped: usize,
}

/// Parse rendered log text into commits.
///
/// Commits come back sorted ascending by creation time; commits with equal
/// times keep their order of appearance. A header that fails to parse is
/// counted in [`ParsedLog::skipped`] and the lines of its block are ignored.
///
/// # Examples
///
/// ```
/// use strata_pulse::log::parse_log;
///
/// let text = "\
/// '[b2] [a1] Ada Lovelace 2020-01-02 10:00:00 +0100 Add engine'
/// 5\t0\tsrc/engine.rs
///
/// '[a1] [] Ada Lovelace 2020-01-01 10:00:00 +0100 Initial commit'
/// 10\t0\tREADME.md
/// ";
/// let log = parse_log(text);
/// assert_eq!(log.commits.len(), 2);
/// assert_eq!(log.commits[0].sha, "a1");
/// assert!(log.commits[0].parent_shas.is_empty());
/// assert_eq!(log.commits[1].changes[0].filename, "src/engine.rs");
/// ```
pub fn parse_log(text: &str) -> ParsedLog {
    let mut log = ParsedLog::default();
    let mut current: Option<Commit> = None;
    let mut in_skipped_block = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with('[') || line.starts_with("'[") {
            if let Some(commit) = current.take() {
                log.commits.push(commit);
            }
            match parse_header(line) {
                Some(commit) => {
                    current = Some(commit);
                    in_skipped_block = false;
                }
                None => {
                    warn!(line, "skipping unparseable commit header");
                    log.skipped += 1;
                    in_skipped_block = true;
                }
            }
            continue;
        }

        let Some(commit) = current.as_mut() else {
            if !in_skipped_block {
                warn!(line, "ignoring line outside of a commit block");
            }
            continue;
        };

        if let Some(caps) = NUMSTAT.captures(line) {
            let added = parse_count(&caps[1]);
            let removed = parse_count(&caps[2]);
            commit.changes.push(Change::new(&caps[3], added, removed));
            continue;
        }

        if let Some(caps) = DELETE_MODE.captures(line) {
            let path = &caps[1];
            match commit.changes.iter_mut().find(|c| c.filename == path) {
                Some(change) => change.removed = true,
                None => warn!(sha = %commit.sha, path, "delete mode line without matching change"),
            }
        }
    }

    if let Some(commit) = current.take() {
        log.commits.push(commit);
    }

    log.commits.sort_by_key(|commit| commit.creation_time);
    log
}

fn parse_header(line: &str) -> Option<Commit> {
    let caps = HEADER.captures(line)?;

    let stamp = caps[4].split_whitespace().collect::<Vec<_>>().join(" ");
    let creation_time = match DateTime::parse_from_str(&stamp, DATE_FORMAT) {
        Ok(time) => time,
        Err(e) => {
            warn!(stamp = %stamp, error = %e, "invalid commit date");
            return None;
        }
    };

    let mut message = caps[5].trim_end();
    if line.starts_with('\'') {
        message = message.strip_suffix('\'').unwrap_or(message);
    }

    Some(Commit {
        sha: caps[1].to_string(),
        parent_shas: caps[2].split_whitespace().map(str::to_string).collect(),
        child_shas: Vec::new(),
        creation_time,
        author: caps[3].to_string(),
        message: message.to_string(),
        changes: Vec::new(),
    })
}

fn parse_count(raw: &str) -> u64 {
    raw.parse().unwrap_or(0)
}

/// Resolve numstat rename notation into `(old, new)` paths.
///
/// Supports the brace form `prefix{old => new}suffix` and the bare form
/// `old/path => new/path`. Returns `None` for paths without a rename, and
/// for malformed rename fragments (which are logged).
///
/// # Examples
///
/// ```
/// use strata_pulse::log::split_rename;
///
/// assert_eq!(
///     split_rename("lib/{ => util}/io.c"),
///     Some(("lib/io.c".to_string(), "lib/util/io.c".to_string()))
/// );
/// assert_eq!(
///     split_rename("old.txt => docs/new.txt"),
///     Some(("old.txt".to_string(), "docs/new.txt".to_string()))
/// );
/// assert_eq!(split_rename("plain.rs"), None);
/// ```
pub fn split_rename(path: &str) -> Option<(String, String)> {
    if !path.contains("=>") {
        return None;
    }

    if path.contains('{') {
        let Some(caps) = BRACE_RENAME.captures(path) else {
            warn!(path, "malformed rename, keeping raw path");
            return None;
        };
        let (prefix, old, new, suffix) = (&caps[1], caps[2].trim(), caps[3].trim(), &caps[4]);
        if old.is_empty() && new.is_empty() {
            warn!(path, "rename with two empty sides, keeping raw path");
            return None;
        }
        return Some((join_parts(prefix, old, suffix), join_parts(prefix, new, suffix)));
    }

    match path.split_once("=>") {
        Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
            Some((old.trim().to_string(), new.trim().to_string()))
        }
        _ => {
            warn!(path, "malformed rename, keeping raw path");
            None
        }
    }
}

/// Rebuild one side of a brace rename. An empty middle drops the separator
/// it would otherwise leave doubled or dangling.
fn join_parts(prefix: &str, middle: &str, suffix: &str) -> String {
    if !middle.is_empty() {
        return format!("{prefix}{middle}{suffix}");
    }
    if prefix.is_empty() {
        return suffix.trim_start_matches('/').to_string();
    }
    if suffix.is_empty() {
        return prefix.trim_end_matches('/').to_string();
    }
    match (prefix.strip_suffix('/'), suffix.starts_with('/')) {
        (Some(head), true) => format!("{head}{suffix}"),
        _ => format!("{prefix}{suffix}"),
    }
}
