//! Per-revision stats computation and incremental cache updates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strata_core::StrataError;
use strata_difflens::complexity::complexity_of;
use strata_difflens::proximity::proximities;
use tracing::{debug, info, warn};

use crate::cache::{RevisionStats, StatsCache, StatsMap};
use crate::graph::CommitGraph;
use crate::lineage::RenameConflict;
use crate::log::{parse_log, Change, Commit};
use crate::mining::{GitRepository, MiningOptions};
use crate::source::{ContentSource, LineCounter};

/// Per-revision stats produced by [`compute_stats`].
#[derive(Debug, Clone, Default)]
pub struct ComputedStats {
    /// `filename -> sha -> stats`.
    pub stats: StatsMap,
    /// Renames onto a name that already had its own history.
    pub conflicts: Vec<RenameConflict>,
}

/// Stats of every change in `commits`, processed oldest first.
///
/// A renamed file inherits the stats recorded under its old name, unless
/// the new name already holds another file's history: that history is kept
/// and the rename is reported as a conflict. Proximity is measured against
/// the commit's first parent; root commits score 0. Content that no longer
/// exists (deleted files) yields zeroed stats.
///
/// # Errors
///
/// Returns [`StrataError::Git`] if the repository cannot be read.
pub fn compute_stats(
    commits: &[Commit],
    source: &dyn ContentSource,
    counter: &dyn LineCounter,
) -> Result<ComputedStats, StrataError> {
    let mut stats = StatsMap::new();
    let conflicts = extend_stats(&mut stats, commits, source, counter)?;
    Ok(ComputedStats { stats, conflicts })
}

fn extend_stats(
    stats: &mut StatsMap,
    commits: &[Commit],
    source: &dyn ContentSource,
    counter: &dyn LineCounter,
) -> Result<Vec<RenameConflict>, StrataError> {
    let mut ordered: Vec<&Commit> = commits.iter().collect();
    ordered.sort_by_key(|c| c.creation_time);

    let mut conflicts = Vec::new();
    for commit in ordered {
        if commit.changes.is_empty() {
            continue;
        }

        let proximity = match commit.parent_shas.first() {
            Some(parent) => {
                let diff = source.diff_between(parent, &commit.sha, None)?;
                proximities(&diff).unwrap_or_else(|e| {
                    debug!(sha = %commit.sha, error = %e, "unreadable diff, proximity zeroed");
                    Default::default()
                })
            }
            None => Default::default(),
        };
        let soc = u32::try_from(commit.changes.len()).unwrap_or(u32::MAX);

        conflicts.extend(carry_renamed_history(stats, commit));

        for change in &commit.changes {
            let (lines, complexity) = match source.file_at(&commit.sha, &change.filename)? {
                Some(text) => {
                    let sample = complexity_of(&commit.sha, &text);
                    (sample.count() as u64, sample.summary())
                }
                None => (0, Default::default()),
            };
            let loc = counter.line_count(&commit.sha, &change.filename)?.unwrap_or(0);

            stats.entry(change.filename.clone()).or_default().insert(
                commit.sha.clone(),
                RevisionStats {
                    name: change.filename.clone(),
                    loc,
                    lines,
                    soc,
                    complexity,
                    proximity: proximity.get(&change.filename).copied().unwrap_or(0),
                },
            );
        }
    }

    Ok(conflicts)
}

/// Copy the history of every file `commit` renames to its new name.
///
/// Renames are resolved as a batch so names swapped within one commit
/// trade histories. A target that holds history and is not itself renamed
/// away keeps it.
fn carry_renamed_history(stats: &mut StatsMap, commit: &Commit) -> Vec<RenameConflict> {
    let renames: Vec<&Change> = commit.changes.iter().filter(|c| c.is_rename()).collect();
    let leaving: HashSet<&str> = renames.iter().map(|c| c.old_filename.as_str()).collect();
    let carried: Vec<_> = renames
        .iter()
        .map(|change| stats.get(&change.old_filename).cloned())
        .collect();

    let mut conflicts = Vec::new();
    for (change, history) in renames.into_iter().zip(carried) {
        let Some(history) = history else {
            continue;
        };
        if stats.contains_key(&change.filename) && !leaving.contains(change.filename.as_str()) {
            warn!(
                sha = %commit.sha,
                from = %change.old_filename,
                to = %change.filename,
                "rename target already has history, keeping it"
            );
            conflicts.push(RenameConflict {
                sha: commit.sha.clone(),
                old_filename: change.old_filename.clone(),
                filename: change.filename.clone(),
            });
            continue;
        }
        stats.insert(change.filename.clone(), history);
    }
    conflicts
}

/// Outcome of [`update_cache`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    /// Commits mined by this update.
    pub new_commits: usize,
    /// Commits in the cache after the update.
    pub total_commits: usize,
    /// Files with stats after the update.
    pub files: usize,
    /// Renames in the new commits whose target already had history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<RenameConflict>,
}

/// Bring `cache` up to date with `repo`.
///
/// Only commits after the newest cached one are mined; their stats are
/// computed on top of the cached ones, so renames carry history across
/// updates.
///
/// # Errors
///
/// Returns [`StrataError::Git`] if the repository cannot be read, or a
/// cache error if the cache cannot be loaded or stored.
pub fn update_cache(
    repo: &GitRepository,
    cache: &dyn StatsCache,
    options: &MiningOptions,
) -> Result<UpdateSummary, StrataError> {
    let mut commits = cache.load_commits()?;
    let mut stats = cache.load_stats()?;

    let after = commits
        .iter()
        .max_by_key(|c| c.creation_time)
        .map(|c| c.sha.clone());
    let options = MiningOptions {
        after,
        ..options.clone()
    };
    debug!(after = ?options.after, "mining repository");

    let parsed = parse_log(&repo.render_log(&options)?);
    if parsed.skipped > 0 {
        info!(skipped = parsed.skipped, "skipped unparseable log entries");
    }

    let known: HashSet<&str> = commits.iter().map(|c| c.sha.as_str()).collect();
    let fresh: Vec<Commit> = parsed
        .commits
        .into_iter()
        .filter(|c| !known.contains(c.sha.as_str()))
        .collect();

    let conflicts = extend_stats(&mut stats, &fresh, repo, repo)?;

    let new_commits = fresh.len();
    commits.extend(fresh);
    let commits = CommitGraph::new(commits).into_commits();

    cache.store_commits(&commits)?;
    cache.store_stats(&stats)?;

    let summary = UpdateSummary {
        new_commits,
        total_commits: commits.len(),
        files: stats.len(),
        conflicts,
    };
    info!(
        new = summary.new_commits,
        total = summary.total_commits,
        files = summary.files,
        "cache updated"
    );
    Ok(summary)
}
