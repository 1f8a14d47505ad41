//! Snapshot selection: find the latest dated delivery for a table
//!
//! Each table's source directory accumulates full-replacement deliveries
//! named with an embedded `YYYYMMDD` date. Only the newest one matters;
//! older deliveries are superseded, not incremental.

use crate::error::{IngestError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Required extension for snapshot deliveries
pub const SNAPSHOT_SUFFIX: &str = ".csv.gz";

fn date_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{8}").expect("Invalid date token pattern"))
}

/// A resolved snapshot file for one table
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Full path to the compressed delivery
    pub path: PathBuf,
    /// File name only, recorded in history entries and checkpoints
    pub file_name: String,
    /// The `YYYYMMDD` token extracted from the file name
    pub effective_date: String,
}

/// Extract the first calendar-valid `YYYYMMDD` token from a file name.
///
/// Eight-digit runs that do not parse as a real date (e.g. "20241301")
/// are skipped, so a numeric id elsewhere in the name cannot shadow the
/// actual delivery date.
pub fn effective_date(file_name: &str) -> Option<String> {
    date_token_re()
        .find_iter(file_name)
        .find(|m| NaiveDate::parse_from_str(m.as_str(), "%Y%m%d").is_ok())
        .map(|m| m.as_str().to_string())
}

/// Locate the latest dated snapshot in `source_root/<table>/`.
///
/// Candidates must end in `.csv.gz` and carry a valid date token. The one
/// with the greatest date wins; ties on the date fall back to the greatest
/// file name so repeated runs always pick the same file.
pub fn latest_snapshot(source_root: &Path, table: &str) -> Result<Snapshot> {
    let dir = source_root.join(table);
    let not_found = || IngestError::SnapshotNotFound {
        table: table.to_string(),
        dir: dir.clone(),
    };

    let entries = std::fs::read_dir(&dir).map_err(|_| not_found())?;

    let mut candidates: Vec<(String, String)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(SNAPSHOT_SUFFIX) {
            continue;
        }
        if let Some(date) = effective_date(&name) {
            candidates.push((date, name));
        }
    }

    candidates.sort();
    let (effective_date, file_name) = candidates.pop().ok_or_else(not_found)?;

    Ok(Snapshot {
        path: dir.join(&file_name),
        file_name,
        effective_date,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_effective_date_extraction() {
        assert_eq!(
            effective_date("equity_20240115.csv.gz").as_deref(),
            Some("20240115")
        );
        assert_eq!(effective_date("no_digits.csv.gz"), None);
        assert_eq!(effective_date("equity_99999999.csv.gz"), None);
        // The invalid month 13 run is skipped in favor of the valid token.
        assert_eq!(
            effective_date("20241301_equity_20240115.csv.gz").as_deref(),
            Some("20240115")
        );
    }

    #[test]
    fn test_latest_snapshot_picks_greatest_date() {
        let tmp = TempDir::new().unwrap();
        let table_dir = tmp.path().join("equity");
        std::fs::create_dir_all(&table_dir).unwrap();
        touch(&table_dir, "equity_20240101.csv.gz");
        touch(&table_dir, "equity_20240301.csv.gz");
        touch(&table_dir, "equity_20240215.csv.gz");

        let snapshot = latest_snapshot(tmp.path(), "equity").unwrap();
        assert_eq!(snapshot.file_name, "equity_20240301.csv.gz");
        assert_eq!(snapshot.effective_date, "20240301");
        assert_eq!(snapshot.path, table_dir.join("equity_20240301.csv.gz"));
    }

    #[test]
    fn test_latest_snapshot_ignores_noise() {
        let tmp = TempDir::new().unwrap();
        let table_dir = tmp.path().join("equity");
        std::fs::create_dir_all(&table_dir).unwrap();
        touch(&table_dir, "equity_20240101.csv.gz");
        touch(&table_dir, "equity_20240401.csv"); // wrong suffix
        touch(&table_dir, "equity_latest.csv.gz"); // no date token
        touch(&table_dir, "readme.txt");
        std::fs::create_dir_all(table_dir.join("archive_20240501.csv.gz")).unwrap();

        let snapshot = latest_snapshot(tmp.path(), "equity").unwrap();
        assert_eq!(snapshot.file_name, "equity_20240101.csv.gz");
    }

    #[test]
    fn test_date_tie_breaks_on_file_name() {
        let tmp = TempDir::new().unwrap();
        let table_dir = tmp.path().join("equity");
        std::fs::create_dir_all(&table_dir).unwrap();
        touch(&table_dir, "equity_20240101_a.csv.gz");
        touch(&table_dir, "equity_20240101_b.csv.gz");

        let snapshot = latest_snapshot(tmp.path(), "equity").unwrap();
        assert_eq!(snapshot.file_name, "equity_20240101_b.csv.gz");
    }

    #[test]
    fn test_missing_directory_is_snapshot_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = latest_snapshot(tmp.path(), "equity").unwrap_err();
        assert!(matches!(err, IngestError::SnapshotNotFound { .. }));
    }

    #[test]
    fn test_empty_directory_is_snapshot_not_found() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("equity")).unwrap();
        let err = latest_snapshot(tmp.path(), "equity").unwrap_err();
        assert!(matches!(err, IngestError::SnapshotNotFound { .. }));
    }
}
