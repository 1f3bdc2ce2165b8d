use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Top-level configuration loaded from `.strata.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use strata_core::StrataConfig;
///
/// let config = StrataConfig::default();
/// assert_eq!(config.coupling.min_co_changes, 2);
/// assert_eq!(config.authors.max_authors, 3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Project name, used for the module rollup fallback and the window store.
    #[serde(default)]
    pub project: Option<String>,
    /// History mining settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Temporal coupling thresholds.
    #[serde(default)]
    pub coupling: CouplingConfig,
    /// Author attribution settings.
    #[serde(default)]
    pub authors: AuthorsConfig,
    /// Stats cache location.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Ordered module rollup rules. The first matching pattern wins.
    #[serde(default)]
    pub modules: Vec<ModuleRule>,
}

impl StrataConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::FileNotFound`] if `path` does not exist,
    /// [`StrataError::Io`] if it cannot be read, or [`StrataError::Toml`]
    /// if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use strata_core::StrataConfig;
    /// use std::path::Path;
    ///
    /// let config = StrataConfig::from_file(Path::new(".strata.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, StrataError> {
        if !path.exists() {
            return Err(StrataError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::StrataConfig;
    ///
    /// let toml = r#"
    /// [coupling]
    /// min_co_changes = 4
    /// "#;
    /// let config = StrataConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.coupling.min_co_changes, 4);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, StrataError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Name used for files that match no module rule.
    pub fn project_name(&self) -> &str {
        self.project.as_deref().unwrap_or("repository")
    }
}

/// History mining configuration.
///
/// # Examples
///
/// ```
/// use strata_core::HistoryConfig;
///
/// let config = HistoryConfig::default();
/// assert_eq!(config.since_days, 365);
/// assert!(config.branch.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Branch to mine (default: HEAD).
    pub branch: Option<String>,
    /// Default window length in days (default: 365).
    #[serde(default = "default_since_days")]
    pub since_days: u64,
}

fn default_since_days() -> u64 {
    365
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            branch: None,
            since_days: default_since_days(),
        }
    }
}

/// Thresholds for reporting a file as coupled to a reference file.
///
/// Both comparisons are strict: a file is reported only when its co-change
/// count is greater than `min_co_changes` and its co-change ratio is
/// greater than `min_ratio`.
///
/// # Examples
///
/// ```
/// use strata_core::CouplingConfig;
///
/// let config = CouplingConfig::default();
/// assert_eq!(config.min_co_changes, 2);
/// assert_eq!(config.min_ratio, 0.2);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Co-change count must exceed this (default: 2).
    #[serde(default = "default_min_co_changes")]
    pub min_co_changes: u32,
    /// Co-change ratio must exceed this (default: 0.2).
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
}

fn default_min_co_changes() -> u32 {
    2
}

fn default_min_ratio() -> f64 {
    0.2
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            min_co_changes: default_min_co_changes(),
            min_ratio: default_min_ratio(),
        }
    }
}

/// Author attribution configuration.
///
/// # Examples
///
/// ```
/// use strata_core::{AuthorsConfig, AuthorWeight};
///
/// let config = AuthorsConfig::default();
/// assert_eq!(config.weight, AuthorWeight::Revisions);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthorsConfig {
    /// How many top authors to report (default: 3).
    #[serde(default = "default_max_authors")]
    pub max_authors: usize,
    /// What an author's share is measured in.
    #[serde(default)]
    pub weight: AuthorWeight,
}

fn default_max_authors() -> usize {
    3
}

impl Default for AuthorsConfig {
    fn default() -> Self {
        Self {
            max_authors: default_max_authors(),
            weight: AuthorWeight::default(),
        }
    }
}

/// Unit of an author's contribution to a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorWeight {
    /// One point per revision touching the file.
    #[default]
    Revisions,
    /// Lines added to the file.
    AddedLines,
}

/// Stats cache configuration.
///
/// # Examples
///
/// ```
/// use strata_core::CacheConfig;
/// use std::path::PathBuf;
///
/// assert_eq!(CacheConfig::default().dir, PathBuf::from(".strata"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding `commits.json`, `stats.json` and `windows.db`.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".strata")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

/// One module rollup rule: files matching `pattern` count towards `name`.
///
/// # Examples
///
/// ```
/// use strata_core::ModuleRule;
///
/// let rule = ModuleRule { name: "parser".into(), pattern: "src/parser/**".into() };
/// assert_eq!(rule.name, "parser");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRule {
    /// Module name reported in rollups.
    pub name: String,
    /// Glob pattern matched against repository-relative paths.
    pub pattern: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = StrataConfig::default();
        assert!(config.project.is_none());
        assert_eq!(config.history.since_days, 365);
        assert!(config.history.branch.is_none());
        assert_eq!(config.coupling.min_co_changes, 2);
        assert_eq!(config.coupling.min_ratio, 0.2);
        assert_eq!(config.authors.max_authors, 3);
        assert_eq!(config.authors.weight, AuthorWeight::Revisions);
        assert_eq!(config.cache.dir, PathBuf::from(".strata"));
        assert!(config.modules.is_empty());
        assert_eq!(config.project_name(), "repository");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
project = "spacy"

[history]
branch = "master"
since_days = 90

[coupling]
min_co_changes = 3
min_ratio = 0.25

[authors]
max_authors = 5
weight = "added_lines"

[cache]
dir = "/tmp/strata-cache"

[[modules]]
name = "algorithm"
pattern = "Spacy/Algorithm/**"

[[modules]]
name = "spaces"
pattern = "Spacy/Spaces/**"
"#;
        let config = StrataConfig::from_toml(toml).unwrap();
        assert_eq!(config.project_name(), "spacy");
        assert_eq!(config.history.branch.as_deref(), Some("master"));
        assert_eq!(config.history.since_days, 90);
        assert_eq!(config.coupling.min_co_changes, 3);
        assert_eq!(config.authors.weight, AuthorWeight::AddedLines);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/strata-cache"));
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[0].name, "algorithm");
        assert_eq!(config.modules[1].pattern, "Spacy/Spaces/**");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = StrataConfig::from_toml("").unwrap();
        assert_eq!(config.coupling.min_ratio, 0.2);
        assert_eq!(config.authors.max_authors, 3);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml = r#"
[coupling]
min_ratio = 0.5
"#;
        let config = StrataConfig::from_toml(toml).unwrap();
        assert_eq!(config.coupling.min_ratio, 0.5);
        assert_eq!(config.coupling.min_co_changes, 2);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = StrataConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_author_weight_is_rejected() {
        let toml = r#"
[authors]
weight = "commits"
"#;
        assert!(StrataConfig::from_toml(toml).is_err());
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let path = Path::new("/nonexistent/strata/.strata.toml");
        match StrataConfig::from_file(path) {
            Err(StrataError::FileNotFound(missing)) => assert_eq!(missing, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }
}
