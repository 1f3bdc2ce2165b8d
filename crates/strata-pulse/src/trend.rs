//! Metric trends over a window: whitespace complexity of one file per
//! revision, and diff proximity per file.
//!
//! Both read the per-revision stats cache first and only go to the
//! repository for revisions the cache does not cover.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use strata_core::{DescriptiveStats, StatsSummary, StrataError, TimeWindow};
use strata_difflens::complexity::complexity_of;
use strata_difflens::proximity::proximities;

use crate::cache::{RevisionStats, StatsMap};
use crate::graph::{CommitGraph, Traversal};
use crate::lineage::Lineages;
use crate::log::Commit;
use crate::source::ContentSource;

/// Whitespace complexity of a file at one revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionComplexity {
    /// Revision.
    pub sha: String,
    /// Creation time of the revision.
    pub time: DateTime<FixedOffset>,
    /// Name of the file at this revision.
    pub name: String,
    /// Code lines scored.
    pub lines: u64,
    /// `{total, mean, sd, max}` of the per-line scores.
    pub complexity: StatsSummary,
}

fn cached<'s>(stats: &'s StatsMap, name: &str, sha: &str) -> Option<&'s RevisionStats> {
    stats.get(name)?.get(sha)
}

/// Complexity of `file` at every revision touching it within `window`,
/// oldest first.
///
/// The file's renames are followed backward so each revision is looked up
/// under the name it had at that point. Cached stats are used when present;
/// otherwise the content is read from `source` and scored. Revisions
/// without code lines (for example the one deleting the file) are skipped.
///
/// # Errors
///
/// Returns [`StrataError::Git`] if the content source cannot read a
/// revision missing from the cache.
///
/// # Examples
///
/// ```ignore
/// let stats = cache.load_stats()?;
/// let trend = complexity_trend(&graph, &stats, &repo, "src/main.c", &window)?;
/// for point in &trend {
///     println!("{} {:.2}", point.sha, point.complexity.mean);
/// }
/// ```
pub fn complexity_trend(
    graph: &CommitGraph,
    stats: &StatsMap,
    source: &dyn ContentSource,
    file: &str,
    window: &TimeWindow,
) -> Result<Vec<RevisionComplexity>, StrataError> {
    let (_, mut touched) = Traversal::backward().within(*window).walk_with(
        graph,
        (file.to_string(), Vec::new()),
        |(name, touched), commit| {
            if let Some(change) = commit.change_to(name) {
                touched.push((commit.sha.clone(), commit.creation_time, name.clone()));
                if change.is_rename() {
                    name.clone_from(&change.old_filename);
                }
            }
        },
    );
    touched.reverse();

    let mut trend = Vec::with_capacity(touched.len());
    for (sha, time, name) in touched {
        let (lines, complexity) = match cached(stats, &name, &sha) {
            Some(entry) => (entry.lines, entry.complexity),
            None => match source.file_at(&sha, &name)? {
                Some(text) => {
                    let sample = complexity_of(&sha, &text);
                    (sample.count() as u64, sample.summary())
                }
                None => (0, StatsSummary::default()),
            },
        };
        if lines == 0 {
            tracing::debug!(sha = %sha, file = %name, "no code lines, skipping revision");
            continue;
        }
        trend.push(RevisionComplexity {
            sha,
            time,
            name,
            lines,
            complexity,
        });
    }

    Ok(trend)
}

/// Proximity samples per file over `window`, largest total first.
///
/// Every in-window commit with a parent contributes one sample to each file
/// it changes: the proximity of its edits against the first parent, taken
/// from the cache or, on a miss, from a diff through `source`. Samples are
/// keyed by lineage, so renamed files keep one sample under their latest
/// name. An unparseable diff scores 0.
///
/// # Errors
///
/// Returns [`StrataError::Git`] if the content source cannot produce a
/// diff the cache does not cover.
pub fn proximity_trend(
    graph: &CommitGraph,
    stats: &StatsMap,
    source: &dyn ContentSource,
    window: &TimeWindow,
) -> Result<Vec<DescriptiveStats>, StrataError> {
    let mut lineages = Lineages::default();
    let mut samples: Vec<Vec<f64>> = Vec::new();

    for commit in graph.in_window(window) {
        let step = lineages.advance(commit);
        let Some(parent) = commit.parent_shas.first() else {
            continue;
        };

        let mut diffed: Option<BTreeMap<String, u64>> = None;
        for (change, id) in commit.changes.iter().zip(&step.ids) {
            let value = match cached(stats, &change.filename, &commit.sha) {
                Some(entry) => entry.proximity,
                None => {
                    if diffed.is_none() {
                        diffed = Some(diff_proximities(source, parent, commit)?);
                    }
                    diffed
                        .as_ref()
                        .and_then(|per_file| per_file.get(&change.filename))
                        .copied()
                        .unwrap_or(0)
                }
            };
            if samples.len() <= id.index() {
                samples.resize_with(id.index() + 1, Vec::new);
            }
            samples[id.index()].push(value as f64);
        }
    }

    let mut stats: Vec<DescriptiveStats> = lineages
        .ids()
        .filter_map(|id| {
            let values = samples.get_mut(id.index()).filter(|v| !v.is_empty())?;
            Some(DescriptiveStats::new(
                lineages.current_name(id),
                std::mem::take(values),
            ))
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total()
            .partial_cmp(&a.total())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name().cmp(b.name()))
    });
    Ok(stats)
}

/// Proximity per file of `commit` against `parent`.
fn diff_proximities(
    source: &dyn ContentSource,
    parent: &str,
    commit: &Commit,
) -> Result<BTreeMap<String, u64>, StrataError> {
    let diff = source.diff_between(parent, &commit.sha, None)?;
    let per_file = match proximities(&diff) {
        Ok(per_file) => per_file,
        Err(e) => {
            tracing::warn!(from = %parent, to = %commit.sha, error = %e, "unreadable diff, proximity zeroed");
            return Ok(BTreeMap::new());
        }
    };
    for name in per_file.keys() {
        if commit.change_to(name).is_none() {
            tracing::warn!(file = %name, sha = %commit.sha, "diffed file missing from the commit's changes");
        }
    }
    Ok(per_file)
}
