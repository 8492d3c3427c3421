use std::path::{Path, PathBuf};

use super::SqliteInitError;

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL that
/// creates the database file on first use.
///
/// In-memory URLs are returned unchanged; an existing query string is kept.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("sqlite::memory:") || raw.contains("mode=memory") {
        return raw.to_owned();
    }

    let (path_str, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };
    let path_str = path_str
        .strip_prefix("sqlite://")
        .or_else(|| path_str.strip_prefix("sqlite:"))
        .unwrap_or(path_str);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    let query = query.unwrap_or("mode=rwc");
    format!("sqlite://{}?{query}", absolute.display())
}

/// SQLite creates the database file but not its directory.
///
/// # Errors
///
/// Returns `SqliteInitError::InvalidUrl` for a `sqlite://` URL without a path
/// and `SqliteInitError::Io` if the directory cannot be created.
pub fn prepare_sqlite_dir(db_url: &str) -> Result<(), SqliteInitError> {
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        return Err(SqliteInitError::InvalidUrl(db_url.to_owned()));
    }
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
