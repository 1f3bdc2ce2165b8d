//! Current-window view of every live file.
//!
//! Combines the window's revisions with the newest cached stats, author
//! attribution and proximity, one row per file still present at the window
//! end.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strata_core::{StrataConfig, StrataError, TimeWindow};

use crate::cache::{RevisionStats, StatsMap};
use crate::graph::CommitGraph;
use crate::lineage::RenameConflict;
use crate::ownership::authors;
use crate::revisions::{revisions, FileMetrics};
use crate::source::ContentSource;
use crate::trend::proximity_trend;

/// Output of [`window_metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    /// Window the snapshot covers.
    pub window: TimeWindow,
    /// One row per file, most revisions first.
    pub files: Vec<FileMetrics>,
    /// Rename collisions seen in the window.
    pub conflicts: Vec<RenameConflict>,
}

/// Metrics of every file touched in `window` and still present at its end.
///
/// `present` lists the paths in the tree at the window end. Cached stats are
/// taken from the newest revision at or before the window end; a file whose
/// cached stats report no code lines is left out. Files without cached stats
/// are kept with their cached fields unset. Proximity comes from the cache
/// as well; `source` is only asked for diffs of revisions it does not cover.
///
/// # Errors
///
/// Returns [`StrataError::Git`] if an uncached proximity diff cannot be
/// produced.
pub fn window_metrics(
    graph: &CommitGraph,
    window: &TimeWindow,
    present: &HashSet<String>,
    stats: &StatsMap,
    source: &dyn ContentSource,
    config: &StrataConfig,
) -> Result<WindowSnapshot, StrataError> {
    let report = revisions(graph, window)?;
    let proximity: HashMap<String, _> = proximity_trend(graph, stats, source, window)?
        .into_iter()
        .map(|sample| (sample.name().to_string(), sample.summary()))
        .collect();

    let mut files = Vec::with_capacity(report.files.len());
    for mut file in report.files {
        if !file.live || !present.contains(&file.path) {
            continue;
        }

        if let Some(cached) = latest_cached(graph, window, stats, &file.path) {
            if cached.lines == 0 {
                tracing::debug!(file = %file.path, "no code lines, dropped from snapshot");
                continue;
            }
            file.loc = Some(cached.loc);
            file.lines = Some(cached.lines);
            file.complexity = Some(cached.complexity);
        }

        file.authors = Some(authors(graph, &file.path, &config.authors)?);
        file.proximity = proximity.get(&file.path).copied();
        files.push(file);
    }

    Ok(WindowSnapshot {
        window: *window,
        files,
        conflicts: report.conflicts,
    })
}

/// Cached stats of `path` at its newest revision no later than the window
/// end.
fn latest_cached<'s>(
    graph: &CommitGraph,
    window: &TimeWindow,
    stats: &'s StatsMap,
    path: &str,
) -> Option<&'s RevisionStats> {
    stats
        .get(path)?
        .iter()
        .filter_map(|(sha, entry)| {
            let time = graph.get(sha)?.creation_time;
            (time <= window.end).then_some((time, entry))
        })
        .max_by_key(|(time, _)| *time)
        .map(|(_, entry)| entry)
}
