use std::path::PathBuf;

use strata_difflens::complexity::{complexity_of, count_code_lines};
use strata_difflens::parser::parse_unified_diff;
use strata_difflens::proximity::proximities;

const HEADER: &str = include_str!("fixtures/HilbertSpaceNorm.h");
const REVISION_DIFF: &str = include_str!("fixtures/revision.diff");

#[test]
fn parse_patch_without_git_header() {
    let diff = "\
--- /dev/null
+++ b/demos/bad_code.rs
@@ -0,0 +1,3 @@
+fn main() {
+    println!(\"hello\");
+}
";
    let files = parse_unified_diff(diff).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].new_path, PathBuf::from("demos/bad_code.rs"));
    assert_eq!(files[0].hunks[0].new_lines, 3);
}

#[test]
fn added_line_starting_with_plus_plus_stays_in_its_file() {
    let diff = "\
diff --git a/src/a.c b/src/a.c
--- a/src/a.c
+++ b/src/a.c
@@ -3,2 +3,3 @@
 void tick() {
+++ counter;
 }
@@ -40,2 +41,2 @@
-old();
+new();
 done();
";
    let per_file = proximities(diff).unwrap();
    assert_eq!(per_file.len(), 1);
    assert_eq!(per_file.get("src/a.c"), Some(&38));
}

#[test]
fn header_fixture_complexity() {
    assert_eq!(count_code_lines(HEADER), 13);

    let stats = complexity_of("HilbertSpaceNorm.h", HEADER);
    assert_eq!(stats.count(), 13);
    assert_eq!(stats.total(), 11.0);
    assert!((stats.mean() - 11.0 / 13.0).abs() < 1e-12);
    assert!((stats.sd() - 0.77).abs() < 0.01);
    assert_eq!(stats.max_value(), 2.0);
}

#[test]
fn revision_diff_fixture() {
    let files = parse_unified_diff(REVISION_DIFF).unwrap();
    assert_eq!(files.len(), 3);

    let renamed = files.iter().find(|f| f.is_rename).unwrap();
    assert_eq!(renamed.old_path, PathBuf::from("Spacy/Spaces/norm.hh"));
    assert_eq!(renamed.new_path, PathBuf::from("Spacy/Spaces/HilbertSpaceNorm.h"));

    let per_file = proximities(REVISION_DIFF).unwrap();
    assert_eq!(per_file["Spacy/Spaces/HilbertSpaceNorm.h"], 9);
    assert_eq!(per_file["Spacy/Algorithm/CG/cg.cpp"], 96);
    assert_eq!(per_file["Spacy/Util/legacy.hh"], 0);
}
