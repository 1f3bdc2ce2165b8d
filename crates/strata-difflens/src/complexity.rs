//! Whitespace complexity.
//!
//! Indentation depth is a language-agnostic proxy for nesting. Each code
//! line scores `tabs + spaces / 4`; lines whose space count is not a whole
//! indent step are smoothed towards the previous code line.

use lazy_static::lazy_static;
use regex::Regex;

use strata_core::DescriptiveStats;

lazy_static! {
    static ref COMMENT_LINE: Regex = Regex::new(r"^\s*(//+|\*+/|/\*+).*$").unwrap();
}

const SPACES_PER_INDENT: usize = 4;

/// Whether `line` counts as code: not blank and not a single-line or
/// delimiter comment.
///
/// # Examples
///
/// ```
/// use strata_difflens::complexity::is_code_line;
///
/// assert!(is_code_line("    let x = 1;"));
/// assert!(!is_code_line("   "));
/// assert!(!is_code_line("  // note"));
/// assert!(!is_code_line(" */"));
/// ```
pub fn is_code_line(line: &str) -> bool {
    !line.trim().is_empty() && !COMMENT_LINE.is_match(line)
}

/// Number of code lines in `text`.
///
/// # Examples
///
/// ```
/// use strata_difflens::complexity::count_code_lines;
///
/// let text = "// header\n\nint main() {\n\treturn 0;\n}\n";
/// assert_eq!(count_code_lines(text), 3);
/// ```
pub fn count_code_lines(text: &str) -> u64 {
    text.lines().filter(|line| is_code_line(line)).count() as u64
}

/// Per-line complexity scores for every code line of `text`, in order.
pub fn line_scores(text: &str) -> Vec<f64> {
    let mut scores = Vec::new();
    let mut previous = 0.0;

    for line in text.lines().filter(|line| is_code_line(line)) {
        let tabs = leading(line, '\t', ' ');
        let spaces = leading(line, ' ', '\t');
        let raw = tabs as f64 + spaces as f64 / SPACES_PER_INDENT as f64;

        let score = if spaces % SPACES_PER_INDENT == 0 || raw < previous {
            raw
        } else {
            previous
        };
        scores.push(score);
        previous = score;
    }

    scores
}

/// Whitespace complexity of a whole file, labelled with `name`.
///
/// # Examples
///
/// ```
/// use strata_difflens::complexity::complexity_of;
///
/// let text = "fn f() {\n    if x {\n        y();\n    }\n}\n";
/// let stats = complexity_of("f.rs", text);
/// assert_eq!(stats.values(), &[0.0, 1.0, 2.0, 1.0, 0.0]);
/// assert_eq!(stats.max_value(), 2.0);
/// ```
pub fn complexity_of(name: &str, text: &str) -> DescriptiveStats {
    DescriptiveStats::new(name, line_scores(text))
}

/// Count leading `wanted` characters once every `ignored` character has
/// been removed from the line.
fn leading(line: &str, wanted: char, ignored: char) -> usize {
    line.chars()
        .filter(|&c| c != ignored)
        .take_while(|&c| c == wanted)
        .count()
}
