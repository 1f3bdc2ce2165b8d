//! Logical file identity across renames.
//!
//! A [`FileId`] names one file's history independent of the paths it has
//! lived under. Per-file accumulators are keyed by id, so a rename never
//! moves data between map entries and a rename onto a path that another
//! live file still owns is reported instead of silently merging the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::log::Commit;

/// Stable identifier of one logical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    /// Dense index, usable to address a `Vec` of per-file accumulators.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A path a lineage took on at a given revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAt {
    /// Path from this revision on.
    pub name: String,
    /// Revision that introduced the path.
    pub sha: String,
}

/// A rename whose target path still belonged to a different live file.
///
/// The renamed lineage takes the path; the displaced one loses its name
/// and keeps its own history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameConflict {
    /// Revision carrying the rename.
    pub sha: String,
    /// Path the file was renamed from.
    pub old_filename: String,
    /// Path the file was renamed to.
    pub filename: String,
}

/// Result of feeding one commit through [`Lineages::advance`].
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// The lineage of each change, aligned with `commit.changes`.
    pub ids: Vec<FileId>,
    /// Collisions detected in this commit.
    pub conflicts: Vec<RenameConflict>,
}

/// Registry of logical files: a name-at-time history per id and an index
/// from current path to id.
///
/// # Examples
///
/// ```
/// use strata_pulse::lineage::Lineages;
/// use strata_pulse::log::parse_log;
///
/// let log = parse_log("\
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 add'
/// 3\t0\tsrc/old.c
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 move'
/// 0\t0\tsrc/{old.c => new.c}
/// ");
/// let mut lineages = Lineages::default();
/// let first = lineages.advance(&log.commits[0]).ids[0];
/// let second = lineages.advance(&log.commits[1]).ids[0];
/// assert_eq!(first, second);
/// assert_eq!(lineages.current_name(first), "src/new.c");
/// assert_eq!(lineages.history(first).len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Lineages {
    histories: Vec<Vec<NameAt>>,
    live: Vec<bool>,
    index: HashMap<String, FileId>,
}

impl Lineages {
    /// Number of lineages ever created.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether no lineage exists yet.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// The live lineage currently named `name`.
    pub fn id_of(&self, name: &str) -> Option<FileId> {
        self.index.get(name).copied()
    }

    /// Latest path of `id`.
    pub fn current_name(&self, id: FileId) -> &str {
        self.histories[id.0]
            .last()
            .map(|at| at.name.as_str())
            .unwrap_or_default()
    }

    /// Every path `id` has had, oldest first.
    pub fn history(&self, id: FileId) -> &[NameAt] {
        &self.histories[id.0]
    }

    /// Whether `id` still owns its current path (not deleted, not displaced).
    pub fn is_live(&self, id: FileId) -> bool {
        self.live[id.0]
    }

    /// All ids, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = FileId> {
        (0..self.histories.len()).map(FileId)
    }

    /// Apply one commit's changes.
    ///
    /// Renames are resolved as a batch, so paths swapped within one commit
    /// do not collide. Files deleted by the commit stop being live, so a
    /// later file reusing the path starts a fresh lineage.
    pub fn advance(&mut self, commit: &Commit) -> Step {
        let mut step = Step::default();

        // Detach every renamed-away path first.
        let moving: Vec<Option<FileId>> = commit
            .changes
            .iter()
            .map(|change| {
                if change.is_rename() {
                    self.index.remove(&change.old_filename)
                } else {
                    None
                }
            })
            .collect();

        for (change, moved) in commit.changes.iter().zip(moving) {
            let id = match (change.is_rename(), moved) {
                (true, Some(id)) => {
                    if let Some(displaced) = self.index.get(&change.filename).copied() {
                        if displaced != id {
                            self.live[displaced.0] = false;
                            step.conflicts.push(RenameConflict {
                                sha: commit.sha.clone(),
                                old_filename: change.old_filename.clone(),
                                filename: change.filename.clone(),
                            });
                        }
                    }
                    self.histories[id.0].push(NameAt {
                        name: change.filename.clone(),
                        sha: commit.sha.clone(),
                    });
                    self.index.insert(change.filename.clone(), id);
                    id
                }
                _ => match self.index.get(&change.filename) {
                    Some(&id) => id,
                    None => self.create(&change.filename, &commit.sha),
                },
            };
            step.ids.push(id);
        }

        for (change, id) in commit.changes.iter().zip(&step.ids) {
            if change.removed && self.index.get(&change.filename) == Some(id) {
                self.index.remove(&change.filename);
                self.live[id.0] = false;
            }
        }

        step
    }

    fn create(&mut self, name: &str, sha: &str) -> FileId {
        let id = FileId(self.histories.len());
        self.histories.push(vec![NameAt {
            name: name.to_string(),
            sha: sha.to_string(),
        }]);
        self.live.push(true);
        self.index.insert(name.to_string(), id);
        id
    }
}
