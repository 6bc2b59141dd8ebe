//! Discovery of existing backups.
//!
//! Backups are recognized purely by name: `<prefix>.YYYYMMDD`, optionally
//! followed by `_HHMMSS` and `_mmm`. This is the format produced by
//! [`crate::namer`], so backups left behind by an earlier process are found
//! again on startup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::error::{Result, SinkError};

static BACKUP_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.(\d{4})(\d{2})(\d{2})(?:_(\d{2})(\d{2})(\d{2}))?(?:_(\d{3}))?$")
        .unwrap_or_else(|_| unreachable!("backup suffix regex is valid"))
});

/// A previously rotated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Timestamp encoded in the file name (UTC).
    pub timestamp: DateTime<Utc>,
    /// Full path of the backup.
    pub path: PathBuf,
}

/// Parses the timestamp embedded in a backup file name.
///
/// Returns `None` if `file_name` is the live file itself, does not start
/// with `prefix`, does not match the backup format, or encodes an impossible
/// date. Missing time and millisecond fields default to zero.
#[must_use]
pub fn parse_backup_timestamp(prefix: &str, file_name: &str) -> Option<DateTime<Utc>> {
    let rest = file_name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }

    let caps = BACKUP_SUFFIX_REGEX.captures(rest)?;
    let field = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let year = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2), field(3))?;
    let datetime = date.and_hms_milli_opt(field(4), field(5), field(6), field(7))?;
    Some(datetime.and_utc())
}

/// Splits a log path into the directory holding its backups and the file
/// name they are prefixed with.
pub(crate) fn split_base(base: &Path) -> Result<(PathBuf, String)> {
    let prefix = base
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SinkError::Configuration(format!(
                "log path {} has no UTF-8 file name",
                base.display()
            ))
        })?
        .to_string();

    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((dir, prefix))
}

/// Lists `dir` and returns every backup whose name starts with `prefix`,
/// ordered oldest first.
///
/// Ties on timestamp are ordered by path so one scan is always consistent.
///
/// # Errors
///
/// Returns [`SinkError::Scan`] if the directory cannot be listed.
pub async fn scan(dir: &Path, prefix: &str) -> Result<Vec<BackupEntry>> {
    let scan_err = |source| SinkError::Scan {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(scan_err)?;
    let mut backups = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        match parse_backup_timestamp(prefix, name) {
            Some(timestamp) => backups.push(BackupEntry {
                timestamp,
                path: entry.path(),
            }),
            None => trace!(file = name, "skipping non-backup entry"),
        }
    }

    backups.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(backups)
}

/// Scans the directory containing `base` for backups of it.
///
/// # Errors
///
/// Returns [`SinkError::Scan`] if the directory cannot be listed, or
/// [`SinkError::Configuration`] if `base` has no usable file name.
pub async fn scan_for(base: &Path) -> Result<Vec<BackupEntry>> {
    let (dir, prefix) = split_base(base)?;
    scan(&dir, &prefix).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namer::backup_path;
    use chrono::{Duration, TimeZone, Timelike};
    use tempfile::TempDir;
    use test_case::test_case;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid timestamp")
            .with_nanosecond(ms * 1_000_000)
            .expect("valid millis")
    }

    #[test_case("app.log.20240315" => Some(utc(2024, 3, 15, 0, 0, 0, 0)))]
    #[test_case("app.log.20240315_123045" => Some(utc(2024, 3, 15, 12, 30, 45, 0)))]
    #[test_case("app.log.20240315_123045_007" => Some(utc(2024, 3, 15, 12, 30, 45, 7)))]
    #[test_case("app.log" => None; "live file")]
    #[test_case("app.log.1" => None; "numbered backup")]
    #[test_case("app.log.20241345" => None; "invalid date")]
    #[test_case("app.log.20240315_256199" => None; "invalid time")]
    #[test_case("app.log.20240315.gz" => None; "trailing extension")]
    #[test_case("other.log.20240315" => None; "other prefix")]
    #[test_case("app.logx.20240315" => None; "longer prefix")]
    fn parse_names(name: &str) -> Option<DateTime<Utc>> {
        parse_backup_timestamp("app.log", name)
    }

    #[test]
    fn split_base_relative_file() {
        let (dir, prefix) = split_base(Path::new("app.log")).expect("split");
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "app.log");

        let (dir, prefix) = split_base(Path::new("/var/log/app.log")).expect("split");
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(prefix, "app.log");
    }

    #[tokio::test]
    async fn scan_orders_oldest_first_and_skips_noise() {
        let dir = TempDir::new().expect("create temp dir");
        for name in [
            "app.log",
            "app.log.20240316",
            "app.log.20240315_120000",
            "app.log.20240315",
            "app.log.20240315_120000_500",
            "app.log.bak",
            "unrelated.txt",
        ] {
            std::fs::write(dir.path().join(name), name).expect("write fixture");
        }

        let backups = scan(dir.path(), "app.log").await.expect("scan");
        let names: Vec<String> = backups
            .iter()
            .filter_map(|b| b.path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();

        assert_eq!(
            names,
            vec![
                "app.log.20240315",
                "app.log.20240315_120000",
                "app.log.20240315_120000_500",
                "app.log.20240316",
            ]
        );
    }

    #[tokio::test]
    async fn scan_empty_directory() {
        let dir = TempDir::new().expect("create temp dir");
        let backups = scan(dir.path(), "app.log").await.expect("scan");
        assert!(backups.is_empty());
    }

    #[tokio::test]
    async fn scan_missing_directory_is_scan_error() {
        let dir = TempDir::new().expect("create temp dir");
        let missing = dir.path().join("nope");
        let result = scan(&missing, "app.log").await;
        assert!(matches!(result, Err(SinkError::Scan { .. })));
    }

    #[tokio::test]
    async fn scan_for_uses_parent_directory() {
        let dir = TempDir::new().expect("create temp dir");
        let base = dir.path().join("app.log");
        std::fs::write(dir.path().join("app.log.20240101"), b"x").expect("write fixture");

        let backups = scan_for(&base).await.expect("scan");
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].timestamp, utc(2024, 1, 1, 0, 0, 0, 0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn namer_output_parses_back(
                secs in 0i64..4_102_444_800,
                millis in 0i64..1000,
                offset in prop::option::of(0i64..172_800_000),
            ) {
                let now = DateTime::<Utc>::from_timestamp(secs, 0).expect("in range")
                    + Duration::milliseconds(millis);
                let last = offset.map(|o| now - Duration::milliseconds(o));

                let path = backup_path(Path::new("app.log"), now, last);
                let name = path.to_string_lossy().into_owned();
                let parsed = parse_backup_timestamp("app.log", &name);

                prop_assert!(parsed.is_some());
                let parsed = parsed.expect("checked above");
                prop_assert!(parsed <= now);
                prop_assert_eq!(parsed.date_naive(), now.date_naive());
                prop_assert!(now - parsed < Duration::days(1));
            }
        }
    }
}
