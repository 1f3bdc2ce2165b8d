//! SQLite storage for window snapshots.
//!
//! Each project gets its own table of `(start, end, stats)` rows, keyed by
//! the window bounds in epoch seconds. A window is computed once; storing
//! it again leaves the first snapshot in place.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use strata_core::{StrataError, TimeWindow};

/// A snapshot read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWindow {
    /// Window begin, epoch seconds.
    pub start: i64,
    /// Window end, epoch seconds.
    pub end: i64,
    /// The snapshot as it was stored.
    pub stats: serde_json::Value,
}

/// SQLite-backed store of per-project window snapshots.
///
/// # Examples
///
/// ```
/// use strata_pulse::store::WindowStore;
///
/// let store = WindowStore::in_memory().unwrap();
/// store.add_project("spacy").unwrap();
/// assert_eq!(store.projects().unwrap(), vec!["spacy".to_string()]);
/// ```
pub struct WindowStore {
    conn: Connection,
}

impl WindowStore {
    /// Open or create a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use strata_pulse::store::WindowStore;
    ///
    /// let store = WindowStore::open(Path::new(".strata/windows.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, StrataError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StrataError::Database(format!("failed to create store directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StrataError::Database(format!("failed to open database: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, StrataError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StrataError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StrataError> {
        self.conn
            .execute_batch("CREATE TABLE IF NOT EXISTS projects (project TEXT PRIMARY KEY);")
            .map_err(|e| StrataError::Database(format!("failed to create schema: {e}")))
    }

    /// Register `project` and create its window table.
    ///
    /// Registering a project twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] on failure, or if `project` is
    /// empty.
    pub fn add_project(&self, project: &str) -> Result<(), StrataError> {
        if project.is_empty() {
            return Err(StrataError::Database("project name must not be empty".into()));
        }
        let table = table_name(project);
        self.conn
            .execute_batch(&format!(
                r#"CREATE TABLE IF NOT EXISTS {table} (
                    "start" INTEGER NOT NULL,
                    "end" INTEGER NOT NULL,
                    stats TEXT NOT NULL,
                    PRIMARY KEY ("start", "end")
                );"#
            ))
            .map_err(|e| {
                StrataError::Database(format!("failed to create table for '{project}': {e}"))
            })?;

        let added = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO projects (project) VALUES (?1)",
                params![project],
            )
            .map_err(|e| StrataError::Database(format!("failed to add project '{project}': {e}")))?;
        if added > 0 {
            tracing::debug!(project, "registered project");
        }
        Ok(())
    }

    /// Registered projects, by name.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] on query failure.
    pub fn projects(&self) -> Result<Vec<String>, StrataError> {
        let mut stmt = self
            .conn
            .prepare("SELECT project FROM projects ORDER BY project")
            .map_err(|e| StrataError::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StrataError::Database(format!("failed to list projects: {e}")))?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(|e| StrataError::Database(format!("failed to read project row: {e}")))
    }

    /// Store the snapshot of `window` for `project`, registering the
    /// project if needed.
    ///
    /// Returns `false` without touching the stored row if the window is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Serialization`] if `stats` cannot be encoded,
    /// or [`StrataError::Database`] on insert failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::DateTime;
    /// use strata_core::TimeWindow;
    /// use strata_pulse::store::WindowStore;
    ///
    /// let store = WindowStore::in_memory().unwrap();
    /// let end = DateTime::parse_from_rfc3339("2020-03-01T00:00:00+00:00").unwrap();
    /// let window = TimeWindow::last_days(end, 30);
    /// assert!(store.store_window("spacy", &window, &vec![1, 2, 3]).unwrap());
    /// assert!(!store.store_window("spacy", &window, &vec![4]).unwrap());
    /// ```
    pub fn store_window<T: Serialize>(
        &self,
        project: &str,
        window: &TimeWindow,
        stats: &T,
    ) -> Result<bool, StrataError> {
        self.add_project(project)?;
        let json = serde_json::to_string(stats)?;
        let (start, end) = (window.begin.timestamp(), window.end.timestamp());

        let inserted = self
            .conn
            .execute(
                &format!(
                    r#"INSERT OR IGNORE INTO {} ("start", "end", stats) VALUES (?1, ?2, ?3)"#,
                    table_name(project)
                ),
                params![start, end, json],
            )
            .map_err(|e| {
                StrataError::Database(format!("failed to store window for '{project}': {e}"))
            })?;

        if inserted == 0 {
            tracing::info!(project, start, end, "window already stored, skipping");
        }
        Ok(inserted > 0)
    }

    /// Every stored window of `project`, ordered by bounds. Empty for an
    /// unknown project.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] on query failure, or
    /// [`StrataError::Serialization`] if a stored snapshot is not valid JSON.
    pub fn read_windows(&self, project: &str) -> Result<Vec<StoredWindow>, StrataError> {
        if !self.projects()?.iter().any(|p| p == project) {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"SELECT "start", "end", stats FROM {} ORDER BY "start", "end""#,
                table_name(project)
            ))
            .map_err(|e| StrataError::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| StrataError::Database(format!("failed to read windows: {e}")))?;

        let mut windows = Vec::new();
        for row in rows {
            let (start, end, json) =
                row.map_err(|e| StrataError::Database(format!("failed to read window row: {e}")))?;
            windows.push(StoredWindow {
                start,
                end,
                stats: serde_json::from_str(&json)?,
            });
        }
        Ok(windows)
    }

    /// The stored snapshot of exactly `window` for `project`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Database`] on query failure, or
    /// [`StrataError::Serialization`] if the stored snapshot is not valid
    /// JSON.
    pub fn read_window(
        &self,
        project: &str,
        window: &TimeWindow,
    ) -> Result<Option<StoredWindow>, StrataError> {
        let (start, end) = (window.begin.timestamp(), window.end.timestamp());
        Ok(self
            .read_windows(project)?
            .into_iter()
            .find(|stored| stored.start == start && stored.end == end))
    }
}

/// Quoted table identifier for `project`.
fn table_name(project: &str) -> String {
    format!("\"windows:{}\"", project.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::*;

    fn window(days: u64) -> TimeWindow {
        let end = DateTime::parse_from_rfc3339("2020-03-01T00:00:00+00:00").unwrap();
        TimeWindow::last_days(end, days)
    }

    #[test]
    fn existing_window_is_not_overwritten() {
        let store = WindowStore::in_memory().unwrap();
        assert!(store.store_window("spacy", &window(30), &json!({"v": 1})).unwrap());
        assert!(!store.store_window("spacy", &window(30), &json!({"v": 2})).unwrap());

        let windows = store.read_windows("spacy").unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].stats, json!({"v": 1}));
        assert_eq!(windows[0].end - windows[0].start, 30 * 86_400);
    }

    #[test]
    fn stored_window_is_found_by_its_bounds() {
        let store = WindowStore::in_memory().unwrap();
        assert!(store.read_window("spacy", &window(30)).unwrap().is_none());

        store.store_window("spacy", &window(30), &json!({"v": 1})).unwrap();
        store.store_window("spacy", &window(7), &json!({"v": 2})).unwrap();

        let found = store.read_window("spacy", &window(7)).unwrap().unwrap();
        assert_eq!(found.stats, json!({"v": 2}));
        assert!(store.read_window("spacy", &window(1)).unwrap().is_none());
    }

    #[test]
    fn windows_are_kept_per_project() {
        let store = WindowStore::in_memory().unwrap();
        store.store_window("a", &window(30), &json!([1])).unwrap();
        store.store_window("a", &window(7), &json!([2])).unwrap();
        store.store_window("b", &window(7), &json!([3])).unwrap();

        let a = store.read_windows("a").unwrap();
        assert_eq!(a.len(), 2);
        // Ordered by start: the 30 day window begins first.
        assert_eq!(a[0].stats, json!([1]));
        assert_eq!(store.read_windows("b").unwrap().len(), 1);
        assert_eq!(store.projects().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn awkward_project_names_are_quoted() {
        let store = WindowStore::in_memory().unwrap();
        let name = "my \"odd\" project; DROP TABLE projects";
        store.store_window(name, &window(1), &json!(null)).unwrap();
        assert_eq!(store.read_windows(name).unwrap().len(), 1);
        assert_eq!(store.projects().unwrap(), vec![name.to_string()]);
    }

    #[test]
    fn unknown_project_has_no_windows() {
        let store = WindowStore::in_memory().unwrap();
        assert!(store.read_windows("nope").unwrap().is_empty());
    }

    #[test]
    fn add_project_is_idempotent() {
        let store = WindowStore::in_memory().unwrap();
        store.add_project("spacy").unwrap();
        store.add_project("spacy").unwrap();
        assert_eq!(store.projects().unwrap().len(), 1);
        assert!(matches!(store.add_project(""), Err(StrataError::Database(_))));
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("windows.db");
        let store = WindowStore::open(&path).unwrap();
        store.store_window("spacy", &window(1), &json!({})).unwrap();
        drop(store);

        let reopened = WindowStore::open(&path).unwrap();
        assert_eq!(reopened.read_windows("spacy").unwrap().len(), 1);
    }
}
