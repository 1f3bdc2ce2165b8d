//! Persisted commit list and per-revision stats.
//!
//! Mining a repository is expensive, so the parsed history and the stats of
//! every revision are kept on disk and extended incrementally by
//! [`update_cache`](crate::update::update_cache).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strata_core::{StatsSummary, StrataError};

use crate::graph::CommitGraph;
use crate::log::{Change, Commit};

/// Stats of one file at one revision.
///
/// # Examples
///
/// ```
/// use strata_core::StatsSummary;
/// use strata_pulse::cache::RevisionStats;
///
/// let stats = RevisionStats {
///     name: "src/main.c".into(),
///     loc: 120,
///     lines: 98,
///     soc: 2,
///     complexity: StatsSummary::default(),
///     proximity: 14,
/// };
/// assert!(stats.lines <= stats.loc);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionStats {
    /// File name at this revision.
    pub name: String,
    /// Lines of code as reported by the line counter.
    pub loc: u64,
    /// Code lines seen by the complexity estimator.
    pub lines: u64,
    /// Files touched by the revision.
    pub soc: u32,
    /// Whitespace complexity of the file at this revision.
    pub complexity: StatsSummary,
    /// Proximity of the revision's edits to the file.
    pub proximity: u64,
}

/// `filename -> sha -> stats`.
pub type StatsMap = BTreeMap<String, BTreeMap<String, RevisionStats>>;

/// On-disk shape of a [`Commit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCommit {
    /// Abbreviated revision id.
    pub sha: String,
    /// Parent ids.
    pub parent_shas: Vec<String>,
    /// Child ids at the time the cache was written.
    pub child_shas: Vec<String>,
    /// Seconds since the Unix epoch.
    pub creation_time: i64,
    /// UTC offset of the commit date, in seconds east of UTC.
    #[serde(default)]
    pub utc_offset: i32,
    /// Author name.
    pub author: String,
    /// Subject line.
    pub msg: String,
    /// Files touched.
    pub changes: Vec<Change>,
}

impl From<&Commit> for StoredCommit {
    fn from(commit: &Commit) -> Self {
        Self {
            sha: commit.sha.clone(),
            parent_shas: commit.parent_shas.clone(),
            child_shas: commit.child_shas.clone(),
            creation_time: commit.creation_time.timestamp(),
            utc_offset: commit.creation_time.offset().local_minus_utc(),
            author: commit.author.clone(),
            msg: commit.message.clone(),
            changes: commit.changes.clone(),
        }
    }
}

impl TryFrom<StoredCommit> for Commit {
    type Error = StrataError;

    fn try_from(stored: StoredCommit) -> Result<Self, Self::Error> {
        let offset = FixedOffset::east_opt(stored.utc_offset).ok_or_else(|| {
            StrataError::Cache(format!(
                "commit {} has invalid UTC offset {}",
                stored.sha, stored.utc_offset
            ))
        })?;
        let creation_time = DateTime::from_timestamp(stored.creation_time, 0)
            .ok_or_else(|| {
                StrataError::Cache(format!(
                    "commit {} has invalid timestamp {}",
                    stored.sha, stored.creation_time
                ))
            })?
            .with_timezone(&offset);

        Ok(Commit {
            sha: stored.sha,
            parent_shas: stored.parent_shas,
            child_shas: stored.child_shas,
            creation_time,
            author: stored.author,
            message: stored.msg,
            changes: stored.changes,
        })
    }
}

/// Storage for mined commits and per-revision stats.
pub trait StatsCache {
    /// Previously mined commits, oldest first. Empty for a fresh cache.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError`] if the cache exists but cannot be read.
    fn load_commits(&self) -> Result<Vec<Commit>, StrataError>;

    /// Replace the stored commit list.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError`] if the cache cannot be written.
    fn store_commits(&self, commits: &[Commit]) -> Result<(), StrataError>;

    /// Previously computed stats. Empty for a fresh cache.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError`] if the cache exists but cannot be read.
    fn load_stats(&self) -> Result<StatsMap, StrataError>;

    /// Replace the stored stats.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError`] if the cache cannot be written.
    fn store_stats(&self, stats: &StatsMap) -> Result<(), StrataError>;

    /// Stored commits with their parent and child links rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError`] if the commits cannot be loaded.
    fn load_graph(&self) -> Result<CommitGraph, StrataError> {
        Ok(CommitGraph::new(self.load_commits()?))
    }
}

/// [`StatsCache`] backed by `commits.json` and `stats.json` in a directory.
///
/// # Examples
///
/// ```
/// use strata_pulse::cache::{JsonCache, StatsCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = JsonCache::new(dir.path());
/// assert!(cache.load_commits().unwrap().is_empty());
/// assert!(cache.load_stats().unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct JsonCache {
    dir: PathBuf,
}

impl JsonCache {
    /// Cache rooted at `dir`. Nothing is created until the first store.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn commits_path(&self) -> PathBuf {
        self.dir.join("commits.json")
    }

    fn stats_path(&self) -> PathBuf {
        self.dir.join("stats.json")
    }

    fn read(&self, path: &Path) -> Result<Option<String>, StrataError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StrataError::Cache(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), StrataError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StrataError::Cache(format!(
                "failed to create cache directory {}: {e}",
                self.dir.display()
            ))
        })?;
        std::fs::write(path, text)
            .map_err(|e| StrataError::Cache(format!("failed to write {}: {e}", path.display())))
    }
}

impl StatsCache for JsonCache {
    fn load_commits(&self) -> Result<Vec<Commit>, StrataError> {
        let Some(text) = self.read(&self.commits_path())? else {
            return Ok(Vec::new());
        };
        let stored: Vec<StoredCommit> = serde_json::from_str(&text)?;
        stored.into_iter().map(Commit::try_from).collect()
    }

    fn store_commits(&self, commits: &[Commit]) -> Result<(), StrataError> {
        let stored: Vec<StoredCommit> = commits.iter().map(StoredCommit::from).collect();
        self.write(&self.commits_path(), &serde_json::to_string(&stored)?)
    }

    fn load_stats(&self) -> Result<StatsMap, StrataError> {
        match self.read(&self.stats_path())? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(StatsMap::new()),
        }
    }

    fn store_stats(&self, stats: &StatsMap) -> Result<(), StrataError> {
        self.write(&self.stats_path(), &serde_json::to_string(stats)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::parse_log;

    const HISTORY: &str = "\
'[a1] [] Ada 2020-01-01 10:00:00 +0130 add'
3\t0\tsrc/old.c
2\t0\tsrc/gone.c
'[b2] [a1] Bob 2020-01-02 09:00:00 -0500 move'
1\t1\tsrc/{old.c => new.c}
0\t2\tsrc/gone.c
 delete mode 100644 src/gone.c
";

    #[test]
    fn commits_survive_a_round_trip_with_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonCache::new(&dir.path().join("nested"));
        let commits = CommitGraph::new(parse_log(HISTORY).commits).into_commits();

        cache.store_commits(&commits).unwrap();
        let loaded = cache.load_commits().unwrap();

        assert_eq!(loaded, commits);
        assert_eq!(loaded[1].creation_time.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(loaded[0].child_shas, vec!["b2".to_string()]);
        assert!(loaded[1].changes[1].removed);
    }

    #[test]
    fn load_graph_relinks_commits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        cache.store_commits(&parse_log(HISTORY).commits).unwrap();

        let graph = cache.load_graph().unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.child_shas(0), &["b2".to_string()]);
    }

    #[test]
    fn stored_commit_uses_epoch_seconds() {
        let commits = parse_log(HISTORY).commits;
        let json = serde_json::to_value(StoredCommit::from(&commits[0])).unwrap();
        // 2020-01-01 10:00 at +01:30 is 08:30 UTC.
        assert_eq!(json["creation_time"], 1_577_867_400);
        assert_eq!(json["msg"], "add");
        assert_eq!(json["changes"][0]["filename"], "src/old.c");
    }

    #[test]
    fn stored_commit_without_offset_is_utc() {
        let json = r#"[{"sha":"a1","parent_shas":[],"child_shas":[],"creation_time":0,
            "author":"Ada","msg":"m","changes":[{"old_filename":"","filename":"f",
            "added_lines":1,"removed_lines":0}]}]"#;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("commits.json"), json).unwrap();

        let loaded = JsonCache::new(dir.path()).load_commits().unwrap();
        assert_eq!(loaded[0].creation_time.timestamp(), 0);
        assert_eq!(loaded[0].creation_time.offset().local_minus_utc(), 0);
        assert!(!loaded[0].changes[0].removed);
    }

    #[test]
    fn stats_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        let mut stats = StatsMap::new();
        stats.entry("src/new.c".into()).or_default().insert(
            "b2".into(),
            RevisionStats {
                name: "src/new.c".into(),
                loc: 10,
                lines: 8,
                soc: 1,
                complexity: StatsSummary {
                    total: 4.0,
                    mean: 0.5,
                    sd: 0.5,
                    max: 1.0,
                },
                proximity: 3,
            },
        );

        cache.store_stats(&stats).unwrap();
        assert_eq!(cache.load_stats().unwrap(), stats);
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stats.json"), "{not json").unwrap();
        let err = JsonCache::new(dir.path()).load_stats().unwrap_err();
        assert!(matches!(err, StrataError::Serialization(_)));
    }
}
