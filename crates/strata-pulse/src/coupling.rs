//! Temporal coupling detection.
//!
//! Identifies files that frequently change in the same commits as a
//! reference file, which may indicate hidden dependencies or architectural
//! coupling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strata_core::{CouplingConfig, StrataError, TimeWindow};

use crate::graph::{CommitGraph, Traversal};

/// A file that changes alongside the reference file.
///
/// # Examples
///
/// ```
/// use strata_pulse::coupling::Coupling;
///
/// let coupling = Coupling {
///     path: "src/session.rs".into(),
///     names: vec!["src/session.rs".into()],
///     co_changes: 15,
///     ratio: 0.75,
/// };
/// assert!(coupling.ratio > 0.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupling {
    /// Latest path of the coupled file inside the window.
    pub path: String,
    /// Every path the coupled file had while coupled, latest first.
    pub names: Vec<String>,
    /// Commits touching both files.
    pub co_changes: u32,
    /// `co_changes / revisions of the reference file`.
    pub ratio: f64,
}

/// Output of [`couplings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouplingReport {
    /// Reference file, by its latest name.
    pub file: String,
    /// Commits touching the reference file in the window.
    pub revisions: u32,
    /// Coupled files, most co-changes first.
    pub coupled: Vec<Coupling>,
}

#[derive(Default)]
struct CouplingState {
    reference: String,
    revisions: u32,
    coupled: Vec<Coupling>,
    index: HashMap<String, usize>,
}

impl CouplingState {
    /// Entry of the coupled lineage currently known as `name`, created if
    /// this is the first time it is seen.
    fn entry(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        self.coupled.push(Coupling {
            path: name.to_string(),
            names: vec![name.to_string()],
            co_changes: 0,
            ratio: 0.0,
        });
        let idx = self.coupled.len() - 1;
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn alias(&mut self, idx: usize, older: &str) {
        if self.index.contains_key(older) {
            return;
        }
        self.coupled[idx].names.push(older.to_string());
        self.index.insert(older.to_string(), idx);
    }
}

/// Find files temporally coupled to `file` within `window`.
///
/// History is walked backward from the window end, following renames of the
/// reference file and of every coupled file. A file is reported only when
/// both `co_changes > min_co_changes` and `ratio > min_ratio` hold.
///
/// # Errors
///
/// Currently infallible; returns [`StrataError`] for parity with the other
/// aggregators.
///
/// # Examples
///
/// ```
/// use strata_core::{CouplingConfig, TimeWindow};
/// use strata_pulse::coupling::couplings;
/// use strata_pulse::graph::CommitGraph;
/// use strata_pulse::log::parse_log;
///
/// let log = parse_log("\
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 one'
/// 1\t0\tauth.rs
/// 1\t0\tsession.rs
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 two'
/// 1\t0\tauth.rs
/// 1\t0\tsession.rs
/// '[c3] [b2] Ada 2020-01-03 00:00:00 +0000 three'
/// 1\t0\tauth.rs
/// 1\t0\tsession.rs
/// ");
/// let graph = CommitGraph::new(log.commits);
/// let report = couplings(&graph, "auth.rs", &TimeWindow::all(), &CouplingConfig::default()).unwrap();
/// assert_eq!(report.revisions, 3);
/// assert_eq!(report.coupled[0].path, "session.rs");
/// ```
pub fn couplings(
    graph: &CommitGraph,
    file: &str,
    window: &TimeWindow,
    config: &CouplingConfig,
) -> Result<CouplingReport, StrataError> {
    let state = CouplingState {
        reference: file.to_string(),
        ..Default::default()
    };

    let mut state = Traversal::backward()
        .within(*window)
        .walk_with(graph, state, |state, commit| {
            let touches_reference = commit.change_to(&state.reference).is_some();
            if touches_reference {
                state.revisions += 1;
            }

            for change in &commit.changes {
                if change.filename == state.reference {
                    continue;
                }
                let known = state.index.get(&change.filename).copied();
                let idx = match (touches_reference, known) {
                    (true, _) => {
                        let idx = state.entry(&change.filename);
                        state.coupled[idx].co_changes += 1;
                        Some(idx)
                    }
                    (false, known) => known,
                };
                if let Some(idx) = idx {
                    if change.is_rename() {
                        state.alias(idx, &change.old_filename);
                    }
                }
            }

            if let Some(change) = commit.change_to(&state.reference) {
                if change.is_rename() {
                    state.reference.clone_from(&change.old_filename);
                }
            }
        });

    let revisions = state.revisions;
    let mut coupled: Vec<Coupling> = state
        .coupled
        .drain(..)
        .filter_map(|mut coupling| {
            if revisions == 0 || coupling.co_changes <= config.min_co_changes {
                return None;
            }
            coupling.ratio = f64::from(coupling.co_changes) / f64::from(revisions);
            (coupling.ratio > config.min_ratio).then_some(coupling)
        })
        .collect();

    coupled.sort_by(|a, b| b.co_changes.cmp(&a.co_changes).then_with(|| a.path.cmp(&b.path)));

    Ok(CouplingReport {
        file: file.to_string(),
        revisions,
        coupled,
    })
}
