//! Cache validity checks.
//!
//! A cache file may be served as-is when it exists, is not older than its
//! source, and is not empty. The checks run in that order and only read
//! filesystem metadata, so any number of requests can run them at once.
//!
//! Timestamps are modification times. The source side comes from the
//! configured [`SourceValidator`](crate::source::SourceValidator); when it
//! cannot report one, only existence and size are checked.

use std::fmt;
use std::path::Path;
use std::time::SystemTime;

/// Outcome of checking one cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No cache file (or something other than a regular file) at the path.
    Missing,
    /// The source was modified after the cache file was written.
    Stale,
    /// Zero bytes, typically left behind by an interrupted write.
    Empty,
    Valid,
}

impl CacheStatus {
    pub fn is_valid(self) -> bool {
        self == CacheStatus::Valid
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheStatus::Missing => "missing",
            CacheStatus::Stale => "stale",
            CacheStatus::Empty => "empty",
            CacheStatus::Valid => "valid",
        };
        f.write_str(label)
    }
}

/// Classify the cache file at `cache_file` against the source's mtime.
pub fn check_cache(cache_file: &Path, source_modified: Option<SystemTime>) -> CacheStatus {
    let meta = match std::fs::metadata(cache_file) {
        Ok(meta) if meta.is_file() => meta,
        _ => return CacheStatus::Missing,
    };

    if let Some(source_modified) = source_modified {
        // An unreadable mtime cannot prove freshness.
        match meta.modified() {
            Ok(cache_modified) if cache_modified >= source_modified => {}
            _ => return CacheStatus::Stale,
        }
    }

    if meta.len() == 0 {
        return CacheStatus::Empty;
    }

    CacheStatus::Valid
}

/// Whether the cache file can be served without regenerating it.
pub fn is_valid(cache_file: &Path, source_modified: Option<SystemTime>) -> bool {
    check_cache(cache_file, source_modified).is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::set_mtime;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("image__foo.jpg");
        assert_eq!(check_cache(&path, None), CacheStatus::Missing);
        assert!(!is_valid(&path, None));
    }

    #[test]
    fn directory_counts_as_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(check_cache(tmp.path(), None), CacheStatus::Missing);
    }

    #[test]
    fn fresh_file_newer_than_source_is_valid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cached.jpg");
        fs::write(&path, b"data").unwrap();
        let source_modified = SystemTime::now() - Duration::from_secs(3600);
        assert_eq!(check_cache(&path, Some(source_modified)), CacheStatus::Valid);
    }

    #[test]
    fn equal_timestamps_are_valid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cached.jpg");
        fs::write(&path, b"data").unwrap();
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        set_mtime(&path, t);
        assert!(is_valid(&path, Some(t)));
    }

    #[test]
    fn file_older_than_source_is_stale() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cached.jpg");
        fs::write(&path, b"data").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&path, old);
        assert_eq!(check_cache(&path, Some(SystemTime::now())), CacheStatus::Stale);
    }

    #[test]
    fn zero_byte_file_is_invalid_regardless_of_timestamps() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("zero.jpg");
        fs::write(&path, b"").unwrap();
        assert_eq!(check_cache(&path, None), CacheStatus::Empty);
        let long_ago = SystemTime::UNIX_EPOCH;
        assert_eq!(check_cache(&path, Some(long_ago)), CacheStatus::Empty);
    }

    #[test]
    fn no_source_timestamp_skips_staleness() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cached.jpg");
        fs::write(&path, b"data").unwrap();
        set_mtime(&path, SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        assert!(is_valid(&path, None));
    }

    #[test]
    fn status_display() {
        assert_eq!(CacheStatus::Stale.to_string(), "stale");
        assert_eq!(CacheStatus::Valid.to_string(), "valid");
    }
}
