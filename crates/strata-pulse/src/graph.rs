//! Commit graph and DAG traversal.
//!
//! Commit timestamps do not give a causal order across merges (clocks
//! skew, rebases keep old dates), so every walk here is driven by parent
//! and child edges. A commit fires only once all of its predecessors along
//! the walk direction have fired, which makes a merge reached through
//! several paths fire exactly once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as EdgeDirection;
use strata_core::TimeWindow;
use tracing::{debug, warn};

use crate::log::Commit;

/// Commits linked parent → child, ordered ascending by creation time.
///
/// Positions (`usize`) are indices into that chronological order.
///
/// # Examples
///
/// ```
/// use strata_pulse::graph::CommitGraph;
/// use strata_pulse::log::parse_log;
///
/// let log = parse_log("\
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 second'
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 first'
/// ");
/// let graph = CommitGraph::new(log.commits);
/// assert_eq!(graph.first().unwrap().sha, "a1");
/// assert_eq!(graph.children(0), vec![1]);
/// assert_eq!(graph.child_shas(0), ["b2".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommitGraph {
    dag: DiGraph<Commit, ()>,
    index: HashMap<String, NodeIndex>,
}

impl CommitGraph {
    /// Sort, index and link `commits`.
    ///
    /// Parent shas that name no known commit stay unlinked. Duplicate shas
    /// keep their first occurrence. Each commit's `child_shas` is rewritten
    /// from the resulting links.
    pub fn new(mut commits: Vec<Commit>) -> Self {
        commits.sort_by_key(|commit| commit.creation_time);

        let mut dag = DiGraph::with_capacity(commits.len(), commits.len());
        let mut index = HashMap::with_capacity(commits.len());

        for mut commit in commits {
            if index.contains_key(&commit.sha) {
                warn!(sha = %commit.sha, "duplicate commit ignored");
                continue;
            }
            commit.child_shas.clear();
            let sha = commit.sha.clone();
            let node = dag.add_node(commit);
            index.insert(sha, node);
        }

        let nodes: Vec<NodeIndex> = dag.node_indices().collect();
        for child in nodes {
            let parent_shas = dag[child].parent_shas.clone();
            for parent_sha in &parent_shas {
                match index.get(parent_sha) {
                    Some(&parent) if parent != child => {
                        dag.update_edge(parent, child, ());
                    }
                    _ => debug!(sha = %dag[child].sha, parent = %parent_sha, "unresolved parent"),
                }
            }
        }

        let mut graph = Self { dag, index };
        for idx in 0..graph.len() {
            let shas: Vec<String> = graph
                .children(idx)
                .into_iter()
                .map(|child| graph.commit(child).sha.clone())
                .collect();
            graph.dag[NodeIndex::new(idx)].child_shas = shas;
        }
        graph
    }

    /// Number of commits.
    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    /// Whether the graph holds no commits.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Look up a commit by sha.
    pub fn get(&self, sha: &str) -> Option<&Commit> {
        self.index.get(sha).map(|&node| &self.dag[node])
    }

    /// Chronological position of `sha`.
    pub fn position(&self, sha: &str) -> Option<usize> {
        self.index.get(sha).map(|node| node.index())
    }

    /// The commit at chronological position `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len()`.
    pub fn commit(&self, idx: usize) -> &Commit {
        &self.dag[NodeIndex::new(idx)]
    }

    /// All commits, ascending by creation time.
    pub fn commits(&self) -> impl DoubleEndedIterator<Item = &Commit> + ExactSizeIterator {
        self.dag.node_indices().map(move |node| &self.dag[node])
    }

    /// Earliest commit.
    pub fn first(&self) -> Option<&Commit> {
        self.commits().next()
    }

    /// Latest commit.
    pub fn last(&self) -> Option<&Commit> {
        self.commits().next_back()
    }

    /// Positions of the resolved parents of `idx`, in the order git lists them.
    pub fn parents(&self, idx: usize) -> Vec<usize> {
        self.neighbors(idx, EdgeDirection::Incoming)
    }

    /// Positions of the children of `idx`, oldest first.
    pub fn children(&self, idx: usize) -> Vec<usize> {
        self.neighbors(idx, EdgeDirection::Outgoing)
    }

    /// Shas of the children of `idx`, oldest first.
    pub fn child_shas(&self, idx: usize) -> &[String] {
        &self.commit(idx).child_shas
    }

    /// Commits inside `window`, ascending by creation time.
    pub fn in_window<'a>(&'a self, window: &'a TimeWindow) -> impl Iterator<Item = &'a Commit> + 'a {
        self.commits()
            .filter(move |commit| window.contains(&commit.creation_time))
    }

    /// Consume the graph, returning its commits in chronological order.
    pub fn into_commits(self) -> Vec<Commit> {
        let (nodes, _) = self.dag.into_nodes_edges();
        nodes.into_iter().map(|node| node.weight).collect()
    }

    fn neighbors(&self, idx: usize, direction: EdgeDirection) -> Vec<usize> {
        // petgraph yields the most recently added edge first.
        let mut found: Vec<usize> = self
            .dag
            .neighbors_directed(NodeIndex::new(idx), direction)
            .map(|node| node.index())
            .collect();
        found.reverse();
        found
    }
}

/// Which way a [`Traversal`] follows the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From roots towards tips, gated on parents.
    Forward,
    /// From tips towards roots, gated on children.
    Backward,
}

type Predicate<'p> = Box<dyn Fn(&Commit) -> bool + 'p>;

/// An exactly-once walk over a [`CommitGraph`].
///
/// A forward walk starts from every root commit and fires a commit once all
/// of its resolved parents have fired; a backward walk starts from every tip
/// and waits for all children instead. Among commits that are ready at the
/// same time, a forward walk fires the earliest first and a backward walk
/// the latest first, so side branches interleave by date.
///
/// `include` decides whether a commit's operation runs; `stop` cuts the walk
/// at a commit, so neither it nor anything only reachable through it fires.
///
/// # Examples
///
/// ```
/// use strata_pulse::graph::{CommitGraph, Traversal};
/// use strata_pulse::log::parse_log;
///
/// let log = parse_log("\
/// '[d4] [b2 c3] Ada 2020-01-04 00:00:00 +0000 merge'
/// '[c3] [a1] Ada 2020-01-03 00:00:00 +0000 right'
/// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 left'
/// '[a1] [] Ada 2020-01-01 00:00:00 +0000 root'
/// ");
/// let graph = CommitGraph::new(log.commits);
///
/// let mut seen = Vec::new();
/// Traversal::backward().walk(&graph, |commit| seen.push(commit.sha.clone()));
/// assert_eq!(seen.len(), 4);
/// assert_eq!(seen.first().map(String::as_str), Some("d4"));
/// assert_eq!(seen.last().map(String::as_str), Some("a1"));
/// ```
pub struct Traversal<'p> {
    direction: Direction,
    include: Option<Predicate<'p>>,
    stop: Option<Predicate<'p>>,
}

impl<'p> Traversal<'p> {
    /// A walk from the roots towards the tips.
    pub fn forward() -> Self {
        Self::new(Direction::Forward)
    }

    /// A walk from the tips towards the roots.
    pub fn backward() -> Self {
        Self::new(Direction::Backward)
    }

    fn new(direction: Direction) -> Self {
        Self {
            direction,
            include: None,
            stop: None,
        }
    }

    /// Only run the operation on commits matching `predicate`.
    #[must_use]
    pub fn include(mut self, predicate: impl Fn(&Commit) -> bool + 'p) -> Self {
        self.include = Some(Box::new(predicate));
        self
    }

    /// Only run the operation on commits inside `window`.
    #[must_use]
    pub fn within(self, window: TimeWindow) -> Self {
        self.include(move |commit| window.contains(&commit.creation_time))
    }

    /// Stop descending at commits matching `predicate`.
    #[must_use]
    pub fn stop(mut self, predicate: impl Fn(&Commit) -> bool + 'p) -> Self {
        self.stop = Some(Box::new(predicate));
        self
    }

    /// Run `op` once per reachable, included commit.
    pub fn walk(&self, graph: &CommitGraph, mut op: impl FnMut(&Commit)) {
        self.run(graph, &mut op);
    }

    /// Like [`walk`](Self::walk), threading an explicit accumulator through
    /// every step and returning it at the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_pulse::graph::{CommitGraph, Traversal};
    /// use strata_pulse::log::parse_log;
    ///
    /// let log = parse_log("\
    /// '[b2] [a1] Ada 2020-01-02 00:00:00 +0000 rename'
    /// 0\t0\t{old.c => new.c}
    /// '[a1] [] Ada 2020-01-01 00:00:00 +0000 add'
    /// 3\t0\told.c
    /// ");
    /// let graph = CommitGraph::new(log.commits);
    ///
    /// let names = Traversal::backward().walk_with(&graph, (String::from("new.c"), Vec::new()), |(name, seen), commit| {
    ///     if let Some(change) = commit.change_to(name) {
    ///         seen.push(commit.sha.clone());
    ///         if change.is_rename() {
    ///             *name = change.old_filename.clone();
    ///         }
    ///     }
    /// });
    /// assert_eq!(names.0, "old.c");
    /// assert_eq!(names.1, vec!["b2", "a1"]);
    /// ```
    pub fn walk_with<S>(
        &self,
        graph: &CommitGraph,
        state: S,
        mut op: impl FnMut(&mut S, &Commit),
    ) -> S {
        let mut state = state;
        self.run(graph, &mut |commit: &Commit| op(&mut state, commit));
        state
    }

    fn run(&self, graph: &CommitGraph, op: &mut dyn FnMut(&Commit)) {
        let mut ready: BinaryHeap<Reverse<usize>> = self
            .starts(graph)
            .into_iter()
            .map(|idx| Reverse(self.rank(graph, idx)))
            .collect();
        let mut readiness: HashMap<usize, Readiness> = HashMap::new();
        let mut fired = 0usize;

        while let Some(Reverse(rank)) = ready.pop() {
            let idx = self.rank(graph, rank);
            let commit = graph.commit(idx);
            if self.stop.as_ref().is_some_and(|stop| stop(commit)) {
                debug!(sha = %commit.sha, "walk stopped");
                continue;
            }
            if self.include.as_ref().map_or(true, |include| include(commit)) {
                op(commit);
                fired += 1;
            }

            for next in self.successors(graph, idx) {
                let entry = readiness
                    .entry(next)
                    .or_insert_with(|| Readiness::new(self.predecessors(graph, next)));
                entry.observed.insert(idx);
                if entry.is_ready() {
                    ready.push(Reverse(self.rank(graph, next)));
                }
            }
        }

        debug!(direction = ?self.direction, fired, "walk finished");
    }

    fn starts(&self, graph: &CommitGraph) -> Vec<usize> {
        (0..graph.len())
            .filter(|&idx| self.predecessors(graph, idx).is_empty())
            .collect()
    }

    /// Firing priority of `idx`, lowest first. Applying it twice gives back
    /// the position.
    fn rank(&self, graph: &CommitGraph, idx: usize) -> usize {
        match self.direction {
            Direction::Forward => idx,
            Direction::Backward => graph.len() - 1 - idx,
        }
    }

    fn successors(&self, graph: &CommitGraph, idx: usize) -> Vec<usize> {
        match self.direction {
            Direction::Forward => graph.children(idx),
            Direction::Backward => graph.parents(idx),
        }
    }

    fn predecessors(&self, graph: &CommitGraph, idx: usize) -> Vec<usize> {
        match self.direction {
            Direction::Forward => graph.parents(idx),
            Direction::Backward => graph.children(idx),
        }
    }
}

/// Predecessor edges seen so far for one commit, against those it needs.
struct Readiness {
    expected: HashSet<usize>,
    observed: HashSet<usize>,
}

impl Readiness {
    fn new(expected: Vec<usize>) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            observed: HashSet::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.observed == self.expected
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::log::parse_log;

    // a1 forks into b2 and c3, d4 merges them, e5 follows.
    const DIAMOND: &str = "\
'[e5] [d4] Ada 2020-01-05 00:00:00 +0000 after merge'
1\t0\tz.c
'[d4] [b2 c3] Ada 2020-01-04 00:00:00 +0000 merge'
'[c3] [a1] Bob 2020-01-03 00:00:00 +0000 right'
1\t0\ty.c
'[b2] [a1] Ada 2020-01-02 00:00:00 +0000 left'
1\t0\tx.c
'[a1] [] Ada 2020-01-01 00:00:00 +0000 root'
1\t0\tw.c
";

    fn diamond() -> CommitGraph {
        CommitGraph::new(parse_log(DIAMOND).commits)
    }

    fn count_visits(graph: &CommitGraph, traversal: &Traversal<'_>) -> HashMap<String, usize> {
        let mut visits = HashMap::new();
        traversal.walk(graph, |commit| *visits.entry(commit.sha.clone()).or_insert(0) += 1);
        visits
    }

    #[test]
    fn links_parents_and_children() {
        let graph = diamond();
        let merge = graph.position("d4").unwrap();
        let parents: Vec<&str> = graph
            .parents(merge)
            .into_iter()
            .map(|p| graph.commit(p).sha.as_str())
            .collect();
        assert_eq!(parents, vec!["b2", "c3"]);
        assert_eq!(graph.child_shas(0), ["b2".to_string(), "c3".to_string()]);
        assert_eq!(graph.get("e5").unwrap().parent_shas, vec!["d4"]);
    }

    #[test]
    fn forward_fires_every_commit_once() {
        let graph = diamond();
        let visits = count_visits(&graph, &Traversal::forward());
        assert_eq!(visits.len(), 5);
        assert!(visits.values().all(|&n| n == 1));
    }

    #[test]
    fn backward_fires_every_commit_once() {
        let graph = diamond();
        let visits = count_visits(&graph, &Traversal::backward());
        assert_eq!(visits.len(), 5);
        assert!(visits.values().all(|&n| n == 1));
    }

    #[test]
    fn merge_fires_after_both_parents_despite_clock_skew() {
        // The merge carries a date older than its right-hand parent.
        let log = parse_log(
            "\
'[d4] [b2 c3] Ada 2020-01-02 12:00:00 +0000 merge'
'[c3] [a1] Bob 2020-01-05 00:00:00 +0000 skewed clock'
'[b2] [a1] Ada 2020-01-02 00:00:00 +0000 left'
'[a1] [] Ada 2020-01-01 00:00:00 +0000 root'
",
        );
        let graph = CommitGraph::new(log.commits);
        let mut order = Vec::new();
        Traversal::forward().walk(&graph, |commit| order.push(commit.sha.clone()));
        let at = |sha: &str| order.iter().position(|s| s == sha).unwrap();
        assert_eq!(order.len(), 4);
        assert!(at("d4") > at("b2"));
        assert!(at("d4") > at("c3"));
    }

    #[test]
    fn ready_commits_fire_by_date() {
        let graph = diamond();
        let mut forward = Vec::new();
        Traversal::forward().walk(&graph, |commit| forward.push(commit.sha.clone()));
        assert_eq!(forward, vec!["a1", "b2", "c3", "d4", "e5"]);

        let mut backward = Vec::new();
        Traversal::backward().walk(&graph, |commit| backward.push(commit.sha.clone()));
        assert_eq!(backward, vec!["e5", "d4", "c3", "b2", "a1"]);
    }

    #[test]
    fn unresolved_parent_is_not_linked() {
        let log = parse_log("'[b2] [zz] Ada 2020-01-02 00:00:00 +0000 partial history'\n");
        let graph = CommitGraph::new(log.commits);
        assert!(graph.parents(0).is_empty());
        let visits = count_visits(&graph, &Traversal::forward());
        assert_eq!(visits["b2"], 1);
    }

    #[test]
    fn include_filters_operation_but_not_descent() {
        let graph = diamond();
        let begin = DateTime::parse_from_rfc3339("2020-01-03T00:00:00+00:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2020-01-04T00:00:00+00:00").unwrap();
        let traversal = Traversal::backward().within(TimeWindow::new(begin, end));
        let visits = count_visits(&graph, &traversal);
        let mut shas: Vec<&String> = visits.keys().collect();
        shas.sort();
        assert_eq!(shas, vec!["c3", "d4"]);
    }

    #[test]
    fn stop_cuts_the_branch() {
        let graph = diamond();
        let traversal = Traversal::forward().stop(|commit| commit.sha == "b2");
        let visits = count_visits(&graph, &traversal);
        // The merge waits on b2 forever, so nothing after it fires.
        assert!(visits.contains_key("a1"));
        assert!(visits.contains_key("c3"));
        assert!(!visits.contains_key("b2"));
        assert!(!visits.contains_key("d4"));
        assert!(!visits.contains_key("e5"));
    }

    #[test]
    fn in_window_is_inclusive_and_chronological() {
        let graph = diamond();
        let begin = DateTime::parse_from_rfc3339("2020-01-02T00:00:00+00:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2020-01-04T00:00:00+00:00").unwrap();
        let window = TimeWindow::new(begin, end);
        let shas: Vec<&str> = graph.in_window(&window).map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["b2", "c3", "d4"]);
    }

    #[test]
    fn duplicate_sha_keeps_first() {
        let mut commits = parse_log(DIAMOND).commits;
        let mut copy = commits[0].clone();
        copy.message = "copy".into();
        commits.push(copy);
        let graph = CommitGraph::new(commits);
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.get("a1").unwrap().message, "root");
    }

    #[test]
    fn empty_graph_walks_nothing() {
        let graph = CommitGraph::default();
        assert!(graph.is_empty());
        assert!(graph.first().is_none());
        let visits = count_visits(&graph, &Traversal::forward());
        assert!(visits.is_empty());
    }
}
