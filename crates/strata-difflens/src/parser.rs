//! Unified diff parsing.
//!
//! Turns `git diff <rev> <rev>` output into per-file hunk lists. Only the
//! structure is kept: paths, file status and hunk ranges.

use std::fmt;
use std::path::{Path, PathBuf};

use strata_core::{DiffHunk, StrataError};

/// A complete diff for a single file, containing one or more hunks.
///
/// # Examples
///
/// ```
/// use strata_difflens::parser::parse_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,3 +1,4 @@\n\
///              fn main() {\n\
///             +    println!(\"hello\");\n\
///              }\n";
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// Parsed hunks for this file.
    pub hunks: Vec<DiffHunk>,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
}

impl FileDiff {
    /// The path this diff is reported under: the old path for deleted
    /// files, the new path otherwise.
    pub fn path(&self) -> &Path {
        if self.is_deleted_file {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} hunks)", self.path().display(), self.hunks.len())
    }
}

/// Parse a unified diff string (as produced by `git diff`) into structured [`FileDiff`] entries.
///
/// Handles new files, deleted files, renamed files, quoted paths and
/// patches without a `diff --git` line. Binary files are skipped.
///
/// # Errors
///
/// Returns [`StrataError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use strata_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, StrataError> {
    let mut state = DiffState::default();

    for line in input.lines() {
        // Inside a hunk every line is body until the header counts run out,
        // even one that looks like a `---`/`+++` file header.
        if state.in_hunk_body() && state.consume_body_line(line) {
            continue;
        }

        if line.starts_with("diff --git ") {
            state.start_file();
            continue;
        }

        // Standard patches may lack the "diff --git" line.
        if line.starts_with("--- ") && state.needs_new_file() {
            state.start_file();
        }

        let Some(file) = state.current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            state.is_binary = true;
            continue;
        }

        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if let Some(path) = line.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = PathBuf::from(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("rename to ") {
            file.is_rename = true;
            file.new_path = PathBuf::from(path);
            continue;
        }

        if line.starts_with("index ") || line.starts_with("similarity index") {
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if path == "/dev/null" {
                file.is_deleted_file = true;
            }
            continue;
        }

        if line.starts_with("@@ ") {
            state.start_hunk(line)?;
            continue;
        }

    }

    Ok(state.finish())
}

#[derive(Default)]
struct DiffState {
    files: Vec<FileDiff>,
    current: Option<FileDiff>,
    hunk: Option<DiffHunk>,
    /// Old and new side lines the open hunk still expects.
    remaining: (u32, u32),
    is_binary: bool,
}

impl DiffState {
    fn start_file(&mut self) {
        self.flush_file();
        self.current = Some(FileDiff::default());
    }

    /// A `---` line opens a new file unless the current one has not seen
    /// any hunk yet (its `diff --git` line came first).
    fn needs_new_file(&self) -> bool {
        match &self.current {
            None => true,
            Some(file) => self.hunk.is_some() || !file.hunks.is_empty(),
        }
    }

    fn in_hunk_body(&self) -> bool {
        self.hunk.is_some() && self.remaining != (0, 0)
    }

    /// Count `line` against the open hunk. Returns `false` for a line that
    /// cannot be hunk body, which closes the hunk early.
    fn consume_body_line(&mut self, line: &str) -> bool {
        let (old, new) = match line.as_bytes().first() {
            Some(b' ') => (1, 1),
            Some(b'-') => (1, 0),
            Some(b'+') => (0, 1),
            Some(b'\\') => return true,
            _ => {
                self.remaining = (0, 0);
                return false;
            }
        };
        self.remaining.0 = self.remaining.0.saturating_sub(old);
        self.remaining.1 = self.remaining.1.saturating_sub(new);
        true
    }

    fn start_hunk(&mut self, line: &str) -> Result<(), StrataError> {
        self.flush_hunk();
        let Some(file) = self.current.as_ref() else {
            return Ok(());
        };
        let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
        self.hunk = Some(DiffHunk {
            file_path: file.path().to_path_buf(),
            old_start,
            old_lines,
            new_start,
            new_lines,
        });
        self.remaining = (old_lines, new_lines);
        Ok(())
    }

    fn flush_hunk(&mut self) {
        self.remaining = (0, 0);
        if let (Some(hunk), Some(file)) = (self.hunk.take(), self.current.as_mut()) {
            file.hunks.push(hunk);
        }
    }

    fn flush_file(&mut self) {
        self.flush_hunk();
        if let Some(file) = self.current.take() {
            if !self.is_binary {
                self.files.push(file);
            }
        }
        self.is_binary = false;
    }

    fn finish(mut self) -> Vec<FileDiff> {
        self.flush_file();
        self.files
    }
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), StrataError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| s.find(" @@").map(|end| &s[..end]))
        .ok_or_else(|| StrataError::Parse(format!("invalid hunk header: {line}")))?;

    let (old, new) = inner
        .split_once(' ')
        .ok_or_else(|| StrataError::Parse(format!("invalid hunk header: {line}")))?;

    let old = old
        .strip_prefix('-')
        .ok_or_else(|| StrataError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = new
        .strip_prefix('+')
        .ok_or_else(|| StrataError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), StrataError> {
    let (start, count) = range.split_once(',').unwrap_or((range, "1"));
    let start = start
        .parse()
        .map_err(|_| StrataError::Parse(format!("invalid range number in: {context}")))?;
    let count = count
        .parse()
        .map_err(|_| StrataError::Parse(format!("invalid range count in: {context}")))?;
    Ok((start, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_returns_empty_vec() {
        let files = parse_unified_diff("").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn single_file_single_hunk() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("src/main.rs"));
        assert_eq!(files[0].hunks.len(), 1);
        let hunk = &files[0].hunks[0];
        assert_eq!((hunk.old_start, hunk.old_lines), (1, 3));
        assert_eq!((hunk.new_start, hunk.new_lines), (1, 4));
    }

    #[test]
    fn multiple_files_and_hunks() {
        let diff = "\
diff --git a/a.cpp b/a.cpp
--- a/a.cpp
+++ b/a.cpp
@@ -1,3 +1,4 @@
 int foo() {
+    bar();
 }
@@ -40,3 +41,4 @@
 int baz() {
+    qux();
 }
diff --git a/b.h b/b.h
--- a/b.h
+++ b/b.h
@@ -7 +7,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[0].hunks[1].new_start, 41);
        assert_eq!(files[1].new_path, PathBuf::from("b.h"));
        assert_eq!(files[1].hunks[0].old_lines, 1);
    }

    #[test]
    fn new_file() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
";
        let files = parse_unified_diff(diff).unwrap();
        assert!(files[0].is_new_file);
        assert_eq!(files[0].old_path, PathBuf::from("/dev/null"));
        assert_eq!(files[0].path(), Path::new("new.rs"));
        assert_eq!(files[0].hunks[0].old_lines, 0);
    }

    #[test]
    fn deleted_file_reports_old_path() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn goodbye() {
-    println!(\"old\");
-}
";
        let files = parse_unified_diff(diff).unwrap();
        assert!(files[0].is_deleted_file);
        assert_eq!(files[0].new_path, PathBuf::from("/dev/null"));
        assert_eq!(files[0].path(), Path::new("old.rs"));
        assert_eq!(files[0].hunks[0].file_path, PathBuf::from("old.rs"));
    }

    #[test]
    fn pure_rename_records_both_paths() {
        let diff = "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_rename);
        assert_eq!(files[0].old_path, PathBuf::from("old_name.rs"));
        assert_eq!(files[0].new_path, PathBuf::from("new_name.rs"));
        assert!(files[0].hunks.is_empty());
    }

    #[test]
    fn binary_files_skipped() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("code.rs"));
    }

    #[test]
    fn no_newline_marker_does_not_end_the_file() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1,2 +1,2 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
 tail
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("f.rs"));
    }

    #[test]
    fn header_lookalikes_inside_a_hunk_are_body() {
        let diff = "\
diff --git a/src/a.c b/src/a.c
--- a/src/a.c
+++ b/src/a.c
@@ -3,3 +3,4 @@
 int main() {
+++ counter;
--- total;
+-- total;
 }
@@ -40 +41 @@
-x
+y
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].old_path, PathBuf::from("src/a.c"));
        assert_eq!(files[0].new_path, PathBuf::from("src/a.c"));
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[0].hunks[1].new_start, 41);
    }

    #[test]
    fn patch_without_git_headers_splits_files() {
        let diff = "\
--- a/one.c
+++ b/one.c
@@ -1 +1 @@
-a
+b
--- a/two.c
+++ b/two.c
@@ -7 +7 @@
-c
+d
";
        let files = parse_unified_diff(diff).unwrap();
        let paths: Vec<&Path> = files.iter().map(FileDiff::path).collect();
        assert_eq!(paths, vec![Path::new("one.c"), Path::new("two.c")]);
        assert_eq!(files[1].hunks[0].new_start, 7);
    }

    #[test]
    fn quoted_paths_are_unquoted() {
        assert_eq!(parse_path("\"a/src/my file.rs\""), PathBuf::from("src/my file.rs"));
        let diff = r#"--- "a/src/my file.rs"
+++ "b/src/my file.rs"
@@ -1 +1,2 @@
 old
+new
"#;
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].hunks[0].file_path, PathBuf::from("src/my file.rs"));
    }

    #[test]
    fn malformed_hunk_header_is_an_error() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -x,1 +1 @@
";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(matches!(err, StrataError::Parse(_)));
    }
}
