use std::path::PathBuf;

/// Errors that can occur across the strata workspace.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary renders it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use strata_core::StrataError;
///
/// let err = StrataError::Config("unknown author weight".into());
/// assert!(err.to_string().contains("unknown author weight"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StrataError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Repository access failure (open, lookup, show, diff).
    #[error("git error: {0}")]
    #[diagnostic(help("the current window was aborted; cached entries are untouched"))]
    Git(String),

    /// Log or diff text that could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// SQLite window store failure.
    #[error("database error: {0}")]
    Database(String),

    /// Stats cache is missing, stale, or inconsistent.
    #[error("cache error: {0}")]
    Cache(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StrataError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = StrataError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = StrataError::FileNotFound(PathBuf::from("/tmp/commits.json"));
        assert!(err.to_string().contains("/tmp/commits.json"));
    }

    #[test]
    fn serde_error_converts() {
        let bad = serde_json::from_str::<Vec<u32>>("[1, 2").unwrap_err();
        let err: StrataError = bad.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
