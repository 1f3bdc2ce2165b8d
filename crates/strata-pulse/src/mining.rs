//! Read-only repository access via git2.
//!
//! Renders history in the text format [`parse_log`](crate::log::parse_log)
//! reads, and serves historic file content and diffs straight from the
//! object database. Nothing is checked out, so the working copy is never
//! touched.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use git2::{
    Delta, DiffFindOptions, DiffFormat, DiffOptions, ObjectType, Oid, Patch, Repository, Sort,
    Tree, TreeWalkMode, TreeWalkResult,
};
use strata_core::StrataError;
use tracing::debug;

use crate::source::{count_lines_via, ContentSource, LineCounter};

const SHORT_SHA_LEN: usize = 8;

/// Options for rendering history.
///
/// # Examples
///
/// ```
/// use strata_pulse::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert!(opts.branch.is_none());
/// assert!(opts.after.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Only render commits that are not ancestors of this revision.
    pub after: Option<String>,
}

/// A git repository opened for read-only mining.
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if no repository is found.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use strata_pulse::mining::GitRepository;
    ///
    /// let repo = GitRepository::open(Path::new(".")).unwrap();
    /// println!("HEAD is {}", repo.head_sha().unwrap());
    /// ```
    pub fn open(path: &Path) -> Result<Self, StrataError> {
        let repo = Repository::discover(path)
            .map_err(|e| StrataError::Git(format!("failed to open repository: {e}")))?;
        Ok(Self { repo })
    }

    /// Abbreviated sha of HEAD.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if HEAD cannot be resolved.
    pub fn head_sha(&self) -> Result<String, StrataError> {
        let head = self
            .repo
            .head()
            .and_then(|reference| reference.peel_to_commit())
            .map_err(|e| StrataError::Git(format!("failed to resolve HEAD: {e}")))?;
        Ok(short_sha(head.id()))
    }

    /// Render history as log text, newest first in topological order.
    ///
    /// Each commit becomes a quoted header followed by numstat lines (diffed
    /// against the first parent, with rename detection) and ` delete mode`
    /// lines. Merge commits carry no numstat lines.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the history cannot be walked.
    pub fn render_log(&self, options: &MiningOptions) -> Result<String, StrataError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| StrataError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| StrataError::Git(format!("failed to sort revwalk: {e}")))?;

        if let Some(ref branch) = options.branch {
            let reference = self
                .repo
                .resolve_reference_from_short_name(branch)
                .map_err(|e| StrataError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
            let oid = reference
                .target()
                .ok_or_else(|| StrataError::Git(format!("branch '{branch}' has no target")))?;
            revwalk
                .push(oid)
                .map_err(|e| StrataError::Git(format!("failed to push oid: {e}")))?;
        } else {
            revwalk
                .push_head()
                .map_err(|e| StrataError::Git(format!("failed to push HEAD: {e}")))?;
        }

        if let Some(ref after) = options.after {
            let oid = self.resolve(after)?.id();
            revwalk
                .hide(oid)
                .map_err(|e| StrataError::Git(format!("failed to hide {after}: {e}")))?;
        }

        let mut out = String::new();
        let mut rendered = 0usize;
        for oid in revwalk {
            let oid = oid.map_err(|e| StrataError::Git(format!("revwalk error: {e}")))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| StrataError::Git(format!("failed to find commit: {e}")))?;
            self.render_commit(&commit, &mut out)?;
            rendered += 1;
        }

        debug!(rendered, "rendered log");
        Ok(out)
    }

    /// Paths of every file in the tree of `sha`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the revision cannot be read.
    pub fn files_at(&self, sha: &str) -> Result<Vec<String>, StrataError> {
        let tree = self.tree_of(sha)?;
        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.push(format!("{root}{name}"));
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| StrataError::Git(format!("failed to walk tree of {sha}: {e}")))?;
        Ok(files)
    }

    fn render_commit(&self, commit: &git2::Commit<'_>, out: &mut String) -> Result<(), StrataError> {
        let parents: Vec<String> = commit.parent_ids().map(short_sha).collect();
        let author = commit.author();
        out.push_str(&format!(
            "'[{}] [{}] {} {} {}'\n",
            short_sha(commit.id()),
            parents.join(" "),
            author.name().unwrap_or("unknown"),
            format_time(commit.time())?,
            commit.summary().unwrap_or("")
        ));

        if commit.parent_count() > 1 {
            out.push('\n');
            return Ok(());
        }

        let tree = commit
            .tree()
            .map_err(|e| StrataError::Git(format!("failed to get commit tree: {e}")))?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(
                parent
                    .tree()
                    .map_err(|e| StrataError::Git(format!("failed to get parent tree: {e}")))?,
            ),
            Err(_) => None,
        };

        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(|e| StrataError::Git(format!("failed to compute diff: {e}")))?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| StrataError::Git(format!("failed to find renames: {e}")))?;

        let mut summary = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let old_path = delta.old_file().path().map(path_string);
            let new_path = delta.new_file().path().map(path_string);

            let path = match (delta.status(), old_path, new_path) {
                (Delta::Renamed, Some(old), Some(new)) => rename_path(&old, &new),
                (Delta::Deleted, Some(old), _) => {
                    summary.push(format!(
                        " delete mode {:06o} {old}",
                        u32::from(delta.old_file().mode())
                    ));
                    old
                }
                (Delta::Unmodified, _, _) => continue,
                (_, _, Some(new)) => new,
                (_, Some(old), None) => old,
                (_, None, None) => continue,
            };

            let counts = match Patch::from_diff(&diff, idx)
                .map_err(|e| StrataError::Git(format!("failed to build patch: {e}")))?
            {
                Some(patch) if !delta.flags().is_binary() => {
                    let (_, added, removed) = patch
                        .line_stats()
                        .map_err(|e| StrataError::Git(format!("failed to count lines: {e}")))?;
                    format!("{added}\t{removed}")
                }
                _ => "-\t-".to_string(),
            };
            out.push_str(&format!("{counts}\t{path}\n"));
        }

        for line in summary {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
        Ok(())
    }

    fn resolve(&self, sha: &str) -> Result<git2::Commit<'_>, StrataError> {
        self.repo
            .revparse_single(sha)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| StrataError::Git(format!("failed to resolve revision {sha}: {e}")))
    }

    fn tree_of(&self, sha: &str) -> Result<Tree<'_>, StrataError> {
        self.resolve(sha)?
            .tree()
            .map_err(|e| StrataError::Git(format!("failed to get tree of {sha}: {e}")))
    }
}

impl ContentSource for GitRepository {
    fn file_at(&self, sha: &str, path: &str) -> Result<Option<String>, StrataError> {
        let tree = self.tree_of(sha)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(StrataError::Git(format!("failed to look up {path}: {e}"))),
        };
        let object = entry
            .to_object(&self.repo)
            .map_err(|e| StrataError::Git(format!("failed to load {path} at {sha}: {e}")))?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };
        Ok(std::str::from_utf8(blob.content()).ok().map(str::to_string))
    }

    fn diff_between(&self, from: &str, to: &str, path: Option<&str>) -> Result<String, StrataError> {
        let old_tree = self.tree_of(from)?;
        let new_tree = self.tree_of(to)?;

        let mut opts = DiffOptions::new();
        if let Some(path) = path {
            opts.pathspec(path);
        }
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))
            .map_err(|e| StrataError::Git(format!("failed to diff {from}..{to}: {e}")))?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| StrataError::Git(format!("failed to find renames: {e}")))?;

        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let origin = line.origin();
            if matches!(origin, '+' | '-' | ' ') {
                out.push(origin);
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .map_err(|e| StrataError::Git(format!("failed to print diff {from}..{to}: {e}")))?;
        Ok(out)
    }
}

impl LineCounter for GitRepository {
    fn line_count(&self, sha: &str, path: &str) -> Result<Option<u64>, StrataError> {
        count_lines_via(self, sha, path)
    }
}

/// Render a rename the way `git log --numstat` does, factoring out a common
/// directory prefix and suffix into `prefix{old => new}suffix`.
///
/// # Examples
///
/// ```
/// use strata_pulse::mining::rename_path;
///
/// assert_eq!(rename_path("src/a.c", "src/b.c"), "src/{a.c => b.c}");
/// assert_eq!(rename_path("a/c.txt", "a/b/c.txt"), "a/{ => b}/c.txt");
/// assert_eq!(rename_path("old.txt", "docs/new.txt"), "old.txt => docs/new.txt");
/// ```
pub fn rename_path(old: &str, new: &str) -> String {
    let (a, b) = (old.as_bytes(), new.as_bytes());

    let mut prefix = 0;
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if x != y {
            break;
        }
        if *x == b'/' {
            prefix = i + 1;
        }
    }

    // The suffix scan may reach one byte into the prefix to share its slash.
    let floor = prefix.saturating_sub(1);
    let mut suffix = 0;
    let (mut i, mut j) = (a.len(), b.len());
    while i > floor && j > floor && a[i - 1] == b[j - 1] {
        if a[i - 1] == b'/' {
            suffix = a.len() - (i - 1);
        }
        i -= 1;
        j -= 1;
    }

    if prefix == 0 && suffix == 0 {
        return format!("{old} => {new}");
    }

    let old_mid_end = (a.len() - suffix).max(prefix);
    let new_mid_end = (b.len() - suffix).max(prefix);
    format!(
        "{}{{{} => {}}}{}",
        &old[..prefix],
        &old[prefix..old_mid_end],
        &new[prefix..new_mid_end],
        &old[a.len() - suffix..]
    )
}

fn short_sha(oid: Oid) -> String {
    let full = oid.to_string();
    full[..full.len().min(SHORT_SHA_LEN)].to_string()
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn format_time(time: git2::Time) -> Result<String, StrataError> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .ok_or_else(|| StrataError::Git(format!("invalid utc offset: {}", time.offset_minutes())))?;
    let instant = DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(|| StrataError::Git(format!("invalid commit time: {}", time.seconds())))?;
    Ok(instant
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %z")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::split_rename;

    #[test]
    fn rename_path_round_trips_through_the_log_parser() {
        let cases = [
            ("src/a.c", "src/b.c"),
            ("a/c.txt", "a/b/c.txt"),
            ("a/b/c.txt", "a/c.txt"),
            ("x/f.c", "y/f.c"),
            ("old.txt", "docs/new.txt"),
            ("lib/util/io.c", "lib/core/io.c"),
        ];
        for (old, new) in cases {
            let rendered = rename_path(old, new);
            assert_eq!(
                split_rename(&rendered),
                Some((old.to_string(), new.to_string())),
                "{rendered}"
            );
        }
    }

    #[test]
    fn rename_path_shapes() {
        assert_eq!(rename_path("a/b/c.txt", "a/c.txt"), "a/{b => }/c.txt");
        assert_eq!(rename_path("x/f.c", "y/f.c"), "{x => y}/f.c");
        assert_eq!(rename_path("lib/util/io.c", "lib/core/io.c"), "lib/{util => core}/io.c");
    }

    #[test]
    fn format_time_keeps_offset() {
        let time = git2::Time::new(1_577_872_800, 90);
        assert_eq!(format_time(time).unwrap(), "2020-01-01 11:30:00 +0130");
    }

    #[test]
    fn short_sha_is_eight_chars() {
        let oid = Oid::from_str("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(short_sha(oid), "01234567");
    }
}
