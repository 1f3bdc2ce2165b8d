use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A single hunk from a unified diff.
///
/// # Examples
///
/// ```
/// use strata_core::DiffHunk;
/// use std::path::PathBuf;
///
/// let hunk = DiffHunk {
///     file_path: PathBuf::from("src/lib.rs"),
///     old_start: 10,
///     old_lines: 5,
///     new_start: 10,
///     new_lines: 8,
/// };
/// assert_eq!(hunk.new_lines - hunk.old_lines, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Path to the affected file.
    pub file_path: PathBuf,
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
}

/// Inclusive time window `[begin, end]` that metric aggregators filter on.
///
/// Comparisons are made on instants, so commits recorded with different
/// UTC offsets are ordered correctly.
///
/// # Examples
///
/// ```
/// use chrono::DateTime;
/// use strata_core::TimeWindow;
///
/// let end = DateTime::parse_from_rfc3339("2020-03-01T00:00:00+01:00").unwrap();
/// let window = TimeWindow::last_days(end, 30);
/// assert!(window.contains(&end));
/// assert!(!window.contains(&(end + chrono::Duration::seconds(1))));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First instant included.
    pub begin: DateTime<FixedOffset>,
    /// Last instant included.
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Create a window from explicit bounds.
    pub fn new(begin: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { begin, end }
    }

    /// The `days`-long window ending at `end`.
    pub fn last_days(end: DateTime<FixedOffset>, days: u64) -> Self {
        let begin = i64::try_from(days)
            .ok()
            .and_then(Duration::try_days)
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC.fixed_offset());
        Self { begin, end }
    }

    /// A window covering all representable time.
    pub fn all() -> Self {
        Self {
            begin: DateTime::<Utc>::MIN_UTC.fixed_offset(),
            end: DateTime::<Utc>::MAX_UTC.fixed_offset(),
        }
    }

    /// Whether `instant` lies within `[begin, end]`.
    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        self.begin <= *instant && *instant <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.begin.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Aggregate view of a [`DescriptiveStats`](crate::DescriptiveStats) sample,
/// as stored in the stats cache.
///
/// # Examples
///
/// ```
/// use strata_core::StatsSummary;
///
/// let summary = StatsSummary::default();
/// assert_eq!(summary.total, 0.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    /// Sum of the sample.
    pub total: f64,
    /// Arithmetic mean (0 for an empty sample).
    pub mean: f64,
    /// Population standard deviation.
    pub sd: f64,
    /// Largest value (0 for an empty sample).
    pub max: f64,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use strata_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = TimeWindow::new(at("2020-01-01T00:00:00+00:00"), at("2020-01-31T00:00:00+00:00"));
        assert!(window.contains(&at("2020-01-01T00:00:00+00:00")));
        assert!(window.contains(&at("2020-01-31T00:00:00+00:00")));
        assert!(!window.contains(&at("2019-12-31T23:59:59+00:00")));
    }

    #[test]
    fn window_compares_instants_across_offsets() {
        let window = TimeWindow::new(at("2020-01-01T12:00:00+00:00"), at("2020-01-01T13:00:00+00:00"));
        // 13:30 at +01:00 is 12:30 UTC.
        assert!(window.contains(&at("2020-01-01T13:30:00+01:00")));
        // 12:30 at -02:00 is 14:30 UTC.
        assert!(!window.contains(&at("2020-01-01T12:30:00-02:00")));
    }

    #[test]
    fn all_window_contains_everything_parsed() {
        let window = TimeWindow::all();
        assert!(window.contains(&at("1970-01-01T00:00:00+00:00")));
        assert!(window.contains(&at("2999-01-01T00:00:00+05:30")));
    }

    #[test]
    fn stats_summary_serializes_plain_keys() {
        let summary = StatsSummary {
            total: 11.0,
            mean: 0.85,
            sd: 0.77,
            max: 2.0,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["total"], 11.0);
        assert!(json.get("sd").is_some());
    }
}
