//! Revision counts, churn and sum of coupling.
//!
//! Files are tracked by lineage, so a file renamed inside the window keeps
//! its revisions, churn and sum of coupling under its latest path.

use chrono::{DateTime, FixedOffset};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use strata_core::{ModuleRule, StatsSummary, StrataError, TimeWindow};

use crate::graph::{CommitGraph, Traversal};
use crate::lineage::{Lineages, RenameConflict};
use crate::ownership::AuthorSummary;

/// Lines added and removed by one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnEntry {
    /// Creation time of the commit.
    pub timestamp: DateTime<FixedOffset>,
    /// Lines added.
    pub added: u64,
    /// Lines removed.
    pub removed: u64,
}

/// Per-file metrics over a window.
///
/// `revisions`, `soc`, `last_change` and `churn` come from
/// [`revisions`]; the optional fields are filled in by
/// [`window_metrics`](crate::snapshot::window_metrics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    /// Latest path of the file inside the window.
    pub path: String,
    /// Commits touching the file.
    pub revisions: u32,
    /// Sum of coupling: other files changed alongside this one, summed
    /// over its commits.
    pub soc: u32,
    /// Creation time of the latest commit touching the file.
    pub last_change: DateTime<FixedOffset>,
    /// One entry per commit, oldest first.
    pub churn: Vec<ChurnEntry>,
    /// Whether the file still owns its path at the end of the window.
    pub live: bool,
    /// Code lines at the latest cached revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    /// Lines of code at the latest cached revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<u64>,
    /// Whitespace complexity at the latest cached revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<StatsSummary>,
    /// Proximity across the window's revisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity: Option<StatsSummary>,
    /// Main authors over the whole history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<AuthorSummary>,
}

impl FileMetrics {
    fn new(path: &str, time: DateTime<FixedOffset>) -> Self {
        Self {
            path: path.to_string(),
            revisions: 0,
            soc: 0,
            last_change: time,
            churn: Vec::new(),
            live: true,
            lines: None,
            loc: None,
            complexity: None,
            proximity: None,
            authors: None,
        }
    }

    /// Total lines added plus removed.
    pub fn total_churn(&self) -> u64 {
        self.churn.iter().map(|c| c.added + c.removed).sum()
    }

    fn record(&mut self, time: DateTime<FixedOffset>, added: u64, removed: u64, soc: u32) {
        self.revisions += 1;
        self.soc += soc;
        self.last_change = time;
        self.churn.push(ChurnEntry {
            timestamp: time,
            added,
            removed,
        });
    }
}

/// Output of [`revisions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionsReport {
    /// Window the report covers.
    pub window: TimeWindow,
    /// Files touched in the window, most revisions first.
    pub files: Vec<FileMetrics>,
    /// Renames that landed on a path another live file still owned.
    pub conflicts: Vec<RenameConflict>,
}

impl RevisionsReport {
    /// Metrics of the live file at `path`, or of a retired one if no live
    /// file has that path.
    pub fn get(&self, path: &str) -> Option<&FileMetrics> {
        self.files
            .iter()
            .filter(|f| f.path == path)
            .max_by_key(|f| f.live)
    }
}

/// Count revisions, churn and sum of coupling per file over `window`.
///
/// Commits are processed chronologically. Each commit adds
/// `files touched - 1` to the sum of coupling of every file it touches.
///
/// # Errors
///
/// Currently infallible; returns [`StrataError`] for parity with the other
/// aggregators.
///
/// # Examples
///
/// ```
/// use strata_core::TimeWindow;
/// use strata_pulse::graph::CommitGraph;
/// use strata_pulse::log::parse_log;
/// use strata_pulse::revisions::revisions;
///
/// let log = parse_log("\
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 add'
/// 10\t0\tsrc/old.c
/// 5\t0\tsrc/main.c
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 move'
/// 1\t1\tsrc/{old.c => new.c}
/// ");
/// let graph = CommitGraph::new(log.commits);
/// let report = revisions(&graph, &TimeWindow::all()).unwrap();
/// let moved = report.get("src/new.c").unwrap();
/// assert_eq!(moved.revisions, 2);
/// assert_eq!(moved.soc, 1);
/// assert_eq!(moved.total_churn(), 12);
/// ```
pub fn revisions(graph: &CommitGraph, window: &TimeWindow) -> Result<RevisionsReport, StrataError> {
    let mut lineages = Lineages::default();
    let mut metrics: Vec<Option<FileMetrics>> = Vec::new();
    let mut conflicts = Vec::new();

    for commit in graph.in_window(window) {
        let step = lineages.advance(commit);
        conflicts.extend(step.conflicts);
        let soc = u32::try_from(commit.changes.len().saturating_sub(1)).unwrap_or(u32::MAX);

        for (change, id) in commit.changes.iter().zip(step.ids) {
            if metrics.len() <= id.index() {
                metrics.resize_with(id.index() + 1, || None);
            }
            let entry = metrics[id.index()]
                .get_or_insert_with(|| FileMetrics::new(&change.filename, commit.creation_time));
            entry.path.clone_from(&change.filename);
            entry.record(commit.creation_time, change.added_lines, change.removed_lines, soc);
        }
    }

    let mut files: Vec<FileMetrics> = lineages
        .ids()
        .filter_map(|id| {
            let mut entry = metrics.get_mut(id.index())?.take()?;
            entry.live = lineages.is_live(id);
            Some(entry)
        })
        .collect();
    files.sort_by(|a, b| b.revisions.cmp(&a.revisions).then_with(|| a.path.cmp(&b.path)));

    Ok(RevisionsReport {
        window: *window,
        files,
        conflicts,
    })
}

/// Churn of one commit to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionChurn {
    /// Revision.
    pub sha: String,
    /// Lines added.
    pub added: u64,
    /// Lines removed.
    pub removed: u64,
}

/// Per-commit churn of the file currently named `filename`, following its
/// renames backwards through `window`, oldest first.
///
/// # Examples
///
/// ```
/// use strata_core::TimeWindow;
/// use strata_pulse::graph::CommitGraph;
/// use strata_pulse::log::parse_log;
/// use strata_pulse::revisions::churn_for;
///
/// let log = parse_log("\
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 add'
/// 10\t0\told.c
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 move'
/// 1\t1\t{old.c => new.c}
/// ");
/// let graph = CommitGraph::new(log.commits);
/// let churn = churn_for(&graph, "new.c", &TimeWindow::all());
/// assert_eq!(churn.len(), 2);
/// assert_eq!(churn[0].sha, "a1");
/// assert_eq!(churn[0].added, 10);
/// ```
pub fn churn_for(graph: &CommitGraph, filename: &str, window: &TimeWindow) -> Vec<RevisionChurn> {
    let (_, mut churn) = Traversal::backward().within(*window).walk_with(
        graph,
        (filename.to_string(), Vec::new()),
        |(name, churn), commit| {
            if let Some(change) = commit.change_to(name) {
                churn.push(RevisionChurn {
                    sha: commit.sha.clone(),
                    added: change.added_lines,
                    removed: change.removed_lines,
                });
                if change.is_rename() {
                    name.clone_from(&change.old_filename);
                }
            }
        },
    );
    churn.reverse();
    churn
}

/// Ordered module rules; the first matching pattern wins.
///
/// # Examples
///
/// ```
/// use strata_core::ModuleRule;
/// use strata_pulse::revisions::ModuleMap;
///
/// let rules = vec![
///     ModuleRule { name: "cg".into(), pattern: "Spacy/Algorithm/CG/**".into() },
///     ModuleRule { name: "algorithms".into(), pattern: "Spacy/Algorithm/**".into() },
/// ];
/// let map = ModuleMap::new(&rules, "spacy").unwrap();
/// assert_eq!(map.module_of("Spacy/Algorithm/CG/cg.cpp"), "cg");
/// assert_eq!(map.module_of("Spacy/Algorithm/Newton/newton.cpp"), "algorithms");
/// assert_eq!(map.module_of("README.md"), "Project spacy");
/// ```
#[derive(Debug, Clone)]
pub struct ModuleMap {
    rules: Vec<(String, Pattern)>,
    fallback: String,
}

impl ModuleMap {
    /// Compile `rules`; files matching none belong to `Project <project>`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Config`] if a pattern is not a valid glob.
    pub fn new(rules: &[ModuleRule], project: &str) -> Result<Self, StrataError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Pattern::new(&rule.pattern)
                    .map(|pattern| (rule.name.clone(), pattern))
                    .map_err(|e| {
                        StrataError::Config(format!(
                            "invalid module pattern '{}' for '{}': {e}",
                            rule.pattern, rule.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules,
            fallback: format!("Project {project}"),
        })
    }

    /// Module that `path` belongs to.
    pub fn module_of(&self, path: &str) -> &str {
        self.rules
            .iter()
            .find(|(_, pattern)| pattern.matches(path))
            .map(|(name, _)| name.as_str())
            .unwrap_or(&self.fallback)
    }
}

/// Revision metrics rolled up per module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetrics {
    /// Module name.
    pub name: String,
    /// Commits touching the module.
    pub revisions: u32,
    /// Other modules changed alongside this one, summed over its commits.
    pub soc: u32,
    /// Creation time of the latest commit touching the module.
    pub last_change: DateTime<FixedOffset>,
    /// One entry per commit with the module's summed line counts.
    pub churn: Vec<ChurnEntry>,
}

/// Revisions, churn and sum of coupling per module over `window`.
///
/// Renames are not followed: each change counts towards the module of its
/// post-commit path.
///
/// # Errors
///
/// Returns [`StrataError::Config`] if a module pattern is invalid.
pub fn module_revisions(
    graph: &CommitGraph,
    window: &TimeWindow,
    rules: &[ModuleRule],
    project: &str,
) -> Result<Vec<ModuleMetrics>, StrataError> {
    let map = ModuleMap::new(rules, project)?;
    let mut modules: Vec<ModuleMetrics> = Vec::new();

    for commit in graph.in_window(window) {
        let mut touched: Vec<(&str, u64, u64)> = Vec::new();
        for change in &commit.changes {
            let module = map.module_of(&change.filename);
            match touched.iter_mut().find(|(name, _, _)| *name == module) {
                Some(entry) => {
                    entry.1 += change.added_lines;
                    entry.2 += change.removed_lines;
                }
                None => touched.push((module, change.added_lines, change.removed_lines)),
            }
        }

        let soc = u32::try_from(touched.len().saturating_sub(1)).unwrap_or(u32::MAX);
        for (module, added, removed) in touched {
            let idx = match modules.iter().position(|m| m.name == module) {
                Some(idx) => idx,
                None => {
                    modules.push(ModuleMetrics {
                        name: module.to_string(),
                        revisions: 0,
                        soc: 0,
                        last_change: commit.creation_time,
                        churn: Vec::new(),
                    });
                    modules.len() - 1
                }
            };
            let entry = &mut modules[idx];
            entry.revisions += 1;
            entry.soc += soc;
            entry.last_change = commit.creation_time;
            entry.churn.push(ChurnEntry {
                timestamp: commit.creation_time,
                added,
                removed,
            });
        }
    }

    modules.sort_by(|a, b| b.revisions.cmp(&a.revisions).then_with(|| a.name.cmp(&b.name)));
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::log::parse_log;

    const HISTORY: &str = "\
'[a1] [] Ada 2020-01-01 00:00:00 +0000 import'
10\t0\tsrc/util.c
20\t0\tsrc/main.c
5\t0\tREADME.md
'[b2] [a1] Ada 2020-01-02 00:00:00 +0000 rename'
0\t0\tsrc/{util.c => helpers.c}
2\t2\tsrc/main.c
'[c3] [b2] Bob 2020-01-03 00:00:00 +0000 edit'
4\t1\tsrc/helpers.c
'[d4] [c3] Bob 2020-01-04 00:00:00 +0000 docs'
1\t0\tREADME.md
 delete mode 100644 README.md
";

    fn graph() -> CommitGraph {
        CommitGraph::new(parse_log(HISTORY).commits)
    }

    fn day(d: u32) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(&format!("2020-01-{d:02}T00:00:00+00:00")).unwrap()
    }

    #[test]
    fn rename_carries_revisions_forward() {
        let report = revisions(&graph(), &TimeWindow::all()).unwrap();
        let helpers = report.get("src/helpers.c").unwrap();
        assert_eq!(helpers.revisions, 3);
        assert_eq!(helpers.total_churn(), 15);
        assert_eq!(helpers.last_change, day(3));
        assert!(report.get("src/util.c").is_none());
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn soc_counts_other_files_in_each_commit() {
        let report = revisions(&graph(), &TimeWindow::all()).unwrap();
        // a1 touches three files, b2 two, c3 one.
        assert_eq!(report.get("src/helpers.c").unwrap().soc, 2 + 1);
        assert_eq!(report.get("src/main.c").unwrap().soc, 2 + 1);
        assert_eq!(report.get("README.md").unwrap().soc, 2);
    }

    #[test]
    fn window_limits_commits() {
        let report = revisions(&graph(), &TimeWindow::new(day(2), day(3))).unwrap();
        assert_eq!(report.get("src/helpers.c").unwrap().revisions, 2);
        assert!(report.get("README.md").is_none());
        assert_eq!(report.files.len(), 2);
    }

    #[test]
    fn deleted_files_are_reported_as_not_live() {
        let report = revisions(&graph(), &TimeWindow::all()).unwrap();
        assert!(!report.get("README.md").unwrap().live);
        assert!(report.get("src/main.c").unwrap().live);
    }

    #[test]
    fn files_sorted_by_revisions() {
        let report = revisions(&graph(), &TimeWindow::all()).unwrap();
        assert_eq!(report.files[0].path, "src/helpers.c");
        assert!(report
            .files
            .windows(2)
            .all(|pair| pair[0].revisions >= pair[1].revisions));
    }

    #[test]
    fn rename_collision_is_reported() {
        let log = parse_log(
            "\
'[a1] [] Ada 2020-01-01 00:00:00 +0000 add'
1\t0\ta.c
7\t0\tb.c
'[b2] [a1] Ada 2020-01-02 00:00:00 +0000 clobber'
0\t0\t{a.c => b.c}
",
        );
        let report = revisions(&CommitGraph::new(log.commits), &TimeWindow::all()).unwrap();
        assert_eq!(report.conflicts.len(), 1);
        let live = report.get("b.c").unwrap();
        assert!(live.live);
        assert_eq!(live.revisions, 2);
        // The displaced b.c keeps its own history.
        let displaced: Vec<&FileMetrics> = report.files.iter().filter(|f| !f.live).collect();
        assert_eq!(displaced.len(), 1);
        assert_eq!(displaced[0].total_churn(), 7);
    }

    #[test]
    fn churn_for_follows_renames_backwards() {
        let churn = churn_for(&graph(), "src/helpers.c", &TimeWindow::all());
        let shas: Vec<&str> = churn.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["a1", "b2", "c3"]);
        assert_eq!(churn[2].added, 4);
    }

    #[test]
    fn module_rollup_first_match_wins() {
        let rules = vec![
            ModuleRule {
                name: "helpers".into(),
                pattern: "src/helpers.c".into(),
            },
            ModuleRule {
                name: "sources".into(),
                pattern: "src/*".into(),
            },
        ];
        let modules = module_revisions(&graph(), &TimeWindow::all(), &rules, "demo").unwrap();
        let by_name = |name: &str| modules.iter().find(|m| m.name == name).unwrap();

        // b2 already sees the renamed path, so it counts towards helpers.
        assert_eq!(by_name("sources").revisions, 2);
        assert_eq!(by_name("helpers").revisions, 2);
        assert_eq!(by_name("Project demo").revisions, 2);
        assert_eq!(by_name("sources").churn[0].added, 30);
        assert_eq!(by_name("Project demo").soc, 1);
    }

    #[test]
    fn invalid_module_pattern_is_config_error() {
        let rules = vec![ModuleRule {
            name: "broken".into(),
            pattern: "src/[".into(),
        }];
        let err = ModuleMap::new(&rules, "demo").unwrap_err();
        assert!(matches!(err, StrataError::Config(_)));
    }
}
