//! Diff proximity.
//!
//! Proximity measures how scattered the edits of one revision are within a
//! file: the sum of gaps between successive changed positions. Small values
//! mean the edits are clustered; large values mean they are spread out.

use std::collections::BTreeMap;

use strata_core::StrataError;

use crate::parser::{parse_unified_diff, FileDiff};

/// Changed positions per file, keyed by the path the diff reports.
///
/// Each hunk contributes its start line: the new-side start for live files
/// and the old-side start for deleted files. Pure renames without hunks are
/// omitted.
///
/// # Examples
///
/// ```
/// use strata_difflens::parser::parse_unified_diff;
/// use strata_difflens::proximity::changed_positions;
///
/// let diff = "--- a/f.c\n+++ b/f.c\n@@ -3 +3 @@\n-a\n+b\n@@ -20 +20 @@\n-c\n+d\n";
/// let files = parse_unified_diff(diff).unwrap();
/// let positions = changed_positions(&files);
/// assert_eq!(positions["f.c"], vec![3, 20]);
/// ```
pub fn changed_positions(files: &[FileDiff]) -> BTreeMap<String, Vec<u32>> {
    let mut positions: BTreeMap<String, Vec<u32>> = BTreeMap::new();

    for file in files.iter().filter(|f| !f.hunks.is_empty()) {
        let starts = positions
            .entry(file.path().to_string_lossy().into_owned())
            .or_default();
        starts.extend(file.hunks.iter().map(|hunk| {
            if file.is_deleted_file {
                hunk.old_start
            } else {
                hunk.new_start
            }
        }));
    }

    positions
}

/// Sum of the gaps between successive positions once sorted.
///
/// Zero or one position gives zero.
///
/// # Examples
///
/// ```
/// use strata_difflens::proximity::proximity;
///
/// assert_eq!(proximity(&[40, 3, 12]), 37);
/// assert_eq!(proximity(&[7]), 0);
/// assert_eq!(proximity(&[]), 0);
/// ```
pub fn proximity(positions: &[u32]) -> u64 {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .windows(2)
        .map(|pair| u64::from(pair[1] - pair[0]))
        .sum()
}

/// Proximity of every file touched by `diff_text`.
///
/// # Errors
///
/// Returns [`StrataError::Parse`] if the diff contains a malformed hunk
/// header.
///
/// # Examples
///
/// ```
/// use strata_difflens::proximity::proximities;
///
/// let diff = "--- a/f.c\n+++ b/f.c\n@@ -3 +3 @@\n-a\n+b\n@@ -20 +20 @@\n-c\n+d\n";
/// let per_file = proximities(diff).unwrap();
/// assert_eq!(per_file["f.c"], 17);
/// ```
pub fn proximities(diff_text: &str) -> Result<BTreeMap<String, u64>, StrataError> {
    let files = parse_unified_diff(diff_text)?;
    Ok(changed_positions(&files)
        .into_iter()
        .map(|(path, positions)| {
            let value = proximity(&positions);
            (path, value)
        })
        .collect())
}
