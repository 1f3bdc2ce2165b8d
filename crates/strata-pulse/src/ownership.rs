//! Author attribution.
//!
//! Measures how a file's history is distributed across its authors, to show
//! who holds the knowledge of a file and how many people have touched it.

use serde::{Deserialize, Serialize};
use strata_core::{AuthorWeight, AuthorsConfig, StrataError};

use crate::graph::{CommitGraph, Traversal};

/// One author's share of a file's history.
///
/// # Examples
///
/// ```
/// use strata_pulse::ownership::AuthorShare;
///
/// let share = AuthorShare { name: "alice".into(), fraction: 0.75 };
/// assert!(share.fraction > 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorShare {
    /// Author name as recorded in the log.
    pub name: String,
    /// Weight of this author over the total weight of the file.
    pub fraction: f64,
}

/// Main authors of a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    /// Largest shares first, at most `max_authors` of them.
    pub authors: Vec<AuthorShare>,
    /// Number of different authors who ever touched the file.
    pub distinct_count: usize,
}

impl AuthorSummary {
    /// Share of the leading author, 0 if the file has no history.
    pub fn dominant_fraction(&self) -> f64 {
        self.authors.first().map_or(0.0, |a| a.fraction)
    }
}

/// Attribute the whole history of `file` to its authors.
///
/// Walks backward over every commit, following the file's renames, and
/// weighs each touching commit by [`AuthorWeight`]: one point per revision,
/// or the lines it added.
///
/// # Errors
///
/// Currently infallible; returns [`StrataError`] for parity with the other
/// aggregators.
///
/// # Examples
///
/// ```
/// use strata_core::AuthorsConfig;
/// use strata_pulse::graph::CommitGraph;
/// use strata_pulse::log::parse_log;
/// use strata_pulse::ownership::authors;
///
/// let log = parse_log("\
/// '[a1] [] alice 2020-01-01 00:00:00 +0000 init'
/// 50\t0\tmain.rs
/// '[b2] [a1] alice 2020-01-02 00:00:00 +0000 more'
/// 5\t1\tmain.rs
/// '[c3] [b2] bob 2020-01-03 00:00:00 +0000 fix'
/// 1\t1\tmain.rs
/// '[d4] [c3] carol 2020-01-04 00:00:00 +0000 tweak'
/// 1\t1\tmain.rs
/// ");
/// let graph = CommitGraph::new(log.commits);
/// let summary = authors(&graph, "main.rs", &AuthorsConfig::default()).unwrap();
/// assert_eq!(summary.distinct_count, 3);
/// assert_eq!(summary.authors[0].name, "alice");
/// assert_eq!(summary.authors[0].fraction, 0.5);
/// ```
pub fn authors(
    graph: &CommitGraph,
    file: &str,
    config: &AuthorsConfig,
) -> Result<AuthorSummary, StrataError> {
    let (_, weights) = Traversal::backward().walk_with(
        graph,
        (file.to_string(), Vec::<(String, u64)>::new()),
        |(name, weights), commit| {
            let Some(change) = commit.change_to(name) else {
                return;
            };
            let weight = match config.weight {
                AuthorWeight::Revisions => 1,
                AuthorWeight::AddedLines => change.added_lines,
            };
            match weights.iter_mut().find(|(author, _)| *author == commit.author) {
                Some(entry) => entry.1 += weight,
                None => weights.push((commit.author.clone(), weight)),
            }
            if change.is_rename() {
                name.clone_from(&change.old_filename);
            }
        },
    );

    let total = weights.iter().map(|(_, w)| w).sum::<u64>().max(1) as f64;
    let mut shares: Vec<AuthorShare> = weights
        .iter()
        .map(|(author, weight)| AuthorShare {
            name: author.clone(),
            fraction: *weight as f64 / total,
        })
        .collect();

    shares.sort_by(|a, b| {
        b.fraction
            .partial_cmp(&a.fraction)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    shares.truncate(config.max_authors);

    Ok(AuthorSummary {
        authors: shares,
        distinct_count: weights.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::parse_log;

    const HISTORY: &str = "\
'[a1] [] alice 2020-01-01 00:00:00 +0000 init'
40\t0\tsrc/old.rs
'[b2] [a1] bob 2020-01-02 00:00:00 +0000 move'
0\t0\tsrc/{old.rs => new.rs}
'[c3] [b2] carol 2020-01-03 00:00:00 +0000 edit'
10\t2\tsrc/new.rs
'[d4] [c3] dave 2020-01-04 00:00:00 +0000 edit'
10\t2\tsrc/new.rs
'[e5] [d4] erin 2020-01-05 00:00:00 +0000 unrelated'
99\t0\tsrc/other.rs
";

    fn graph() -> CommitGraph {
        CommitGraph::new(parse_log(HISTORY).commits)
    }

    fn config(weight: AuthorWeight, max_authors: usize) -> AuthorsConfig {
        AuthorsConfig {
            max_authors,
            weight,
        }
    }

    #[test]
    fn revisions_weight_follows_renames() {
        let summary = authors(&graph(), "src/new.rs", &config(AuthorWeight::Revisions, 10)).unwrap();
        assert_eq!(summary.distinct_count, 4);
        assert!(summary.authors.iter().all(|a| (a.fraction - 0.25).abs() < f64::EPSILON));
        assert!(summary.authors.iter().all(|a| a.name != "erin"));
    }

    #[test]
    fn added_lines_weight() {
        let summary = authors(&graph(), "src/new.rs", &config(AuthorWeight::AddedLines, 10)).unwrap();
        assert_eq!(summary.authors[0].name, "alice");
        assert!((summary.authors[0].fraction - 40.0 / 60.0).abs() < 1e-12);
        // bob's rename added nothing.
        assert_eq!(summary.authors.len(), 4);
        assert_eq!(summary.authors[3].name, "bob");
        assert_eq!(summary.authors[3].fraction, 0.0);
    }

    #[test]
    fn top_n_is_truncated_but_count_is_not() {
        let summary = authors(&graph(), "src/new.rs", &config(AuthorWeight::Revisions, 2)).unwrap();
        assert_eq!(summary.authors.len(), 2);
        assert_eq!(summary.distinct_count, 4);
        // Ties break by name.
        assert_eq!(summary.authors[0].name, "alice");
        assert_eq!(summary.authors[1].name, "bob");
    }

    #[test]
    fn repeated_author_accumulates() {
        let log = parse_log(
            "\
'[a1] [] alice 2020-01-01 00:00:00 +0000 one'
1\t0\tmain.rs
'[b2] [a1] alice 2020-01-02 00:00:00 +0000 two'
1\t0\tmain.rs
'[c3] [b2] alice 2020-01-03 00:00:00 +0000 three'
1\t0\tmain.rs
'[d4] [c3] bob 2020-01-04 00:00:00 +0000 four'
1\t0\tmain.rs
",
        );
        let summary = authors(
            &CommitGraph::new(log.commits),
            "main.rs",
            &AuthorsConfig::default(),
        )
        .unwrap();
        assert_eq!(summary.dominant_fraction(), 0.75);
        assert_eq!(summary.distinct_count, 2);
    }

    #[test]
    fn unknown_file_has_no_authors() {
        let summary = authors(&graph(), "missing.rs", &AuthorsConfig::default()).unwrap();
        assert!(summary.authors.is_empty());
        assert_eq!(summary.distinct_count, 0);
        assert_eq!(summary.dominant_fraction(), 0.0);
    }
}
