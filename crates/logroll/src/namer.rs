//! Backup file naming.
//!
//! A backup of `app.log` is named `app.log.YYYYMMDD`. When the previous
//! rotation happened on the same UTC day, `_HHMMSS` is appended, and when it
//! also happened in the same UTC second, `_mmm` (milliseconds) follows. All
//! fields are UTC.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Timelike, Utc};

/// Formats the UTC calendar date as `YYYYMMDD`.
#[must_use]
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}

/// Formats the UTC time of day as `HHMMSS`.
#[must_use]
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%H%M%S").to_string()
}

/// Formats the millisecond part as three zero-padded digits.
#[must_use]
pub fn format_millis(at: DateTime<Utc>) -> String {
    format!("{:03}", at.timestamp_subsec_millis().min(999))
}

fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

fn same_second_of_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.hour() == b.hour() && a.minute() == b.minute() && a.second() == b.second()
}

/// Returns the filename suffix (without the leading dot) for a backup made
/// at `now`, given the timestamp of the previous rotation.
#[must_use]
pub fn backup_suffix(now: DateTime<Utc>, last_rotation: Option<DateTime<Utc>>) -> String {
    let mut suffix = format_date(now);

    if let Some(last) = last_rotation {
        if same_day(now, last) {
            suffix.push('_');
            suffix.push_str(&format_time(now));

            if same_second_of_day(now, last) {
                suffix.push('_');
                suffix.push_str(&format_millis(now));
            }
        }
    }

    suffix
}

/// Computes the backup path for `base` rotated at `now`.
///
/// The result is `base` with `.` and [`backup_suffix`] appended to its final
/// component.
#[must_use]
pub fn backup_path(
    base: &Path,
    now: DateTime<Utc>,
    last_rotation: Option<DateTime<Utc>>,
) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(backup_suffix(now, last_rotation));
    PathBuf::from(name)
}
