//! Download strategies.
//!
//! A [`DownloadStrategy`] answers the cache-or-network question for one
//! request. The engine consults it before any network action: first whether
//! the cache lookup should be skipped entirely, then (on a hit) whether the
//! cached entry is acceptable, and (on a miss) whether a download is allowed
//! at all.
//!
//! Strategies are immutable and stateless; callers share them as
//! `Arc<dyn DownloadStrategy>`.

use crate::cache::EntryMetadata;
use chrono::{DateTime, Utc};

/// Policy deciding cache-vs-network for a request.
pub trait DownloadStrategy: Send + Sync {
    /// Returns true if the engine must fetch without even checking the
    /// cache. Write-payload requests require a strategy answering true.
    fn should_download_without_checking_cache(&self) -> bool;

    /// Returns true if a download may proceed when nothing is cached.
    /// Answering false makes the request cache-only: a miss becomes a
    /// cache-miss failure.
    fn should_download_if_not_cached(&self) -> bool;

    /// Returns true if a fresh download should replace the given cached
    /// entry. Answering false serves the entry as-is.
    fn should_download_if_cached(&self, _entry: &EntryMetadata) -> bool {
        false
    }
}

/// Always fetch, skipping the cache lookup entirely.
///
/// The only strategy valid for write-payload requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadAlways;

impl DownloadStrategy for DownloadAlways {
    fn should_download_without_checking_cache(&self) -> bool {
        true
    }

    fn should_download_if_not_cached(&self) -> bool {
        true
    }

    fn should_download_if_cached(&self, _entry: &EntryMetadata) -> bool {
        true
    }
}

/// Fetch only when nothing is cached; any cached copy is acceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadIfNotCached;

impl DownloadStrategy for DownloadIfNotCached {
    fn should_download_without_checking_cache(&self) -> bool {
        false
    }

    fn should_download_if_not_cached(&self) -> bool {
        true
    }
}

/// Never fetch. A cache miss fails the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadNever;

impl DownloadStrategy for DownloadNever {
    fn should_download_without_checking_cache(&self) -> bool {
        false
    }

    fn should_download_if_not_cached(&self) -> bool {
        false
    }
}

/// Inclusive window of acceptable entry timestamps.
///
/// Entries whose timestamp falls outside the window are considered stale
/// and re-downloaded by [`DownloadWithinBounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampBound {
    min: Option<DateTime<Utc>>,
    max: Option<DateTime<Utc>>,
}

impl TimestampBound {
    /// Accepts entries no older than the given cutoff.
    pub fn not_older_than(cutoff: DateTime<Utc>) -> Self {
        Self {
            min: Some(cutoff),
            max: None,
        }
    }

    /// Accepts entries fetched within the given age of now.
    pub fn max_age(age: chrono::Duration) -> Self {
        Self::not_older_than(Utc::now() - age)
    }

    /// Accepts entries no newer than the given cutoff.
    pub fn not_newer_than(cutoff: DateTime<Utc>) -> Self {
        Self {
            min: None,
            max: Some(cutoff),
        }
    }

    /// Returns true if the timestamp falls inside the window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(min) = self.min {
            if timestamp < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if timestamp > max {
                return false;
            }
        }
        true
    }
}

/// Fetch when nothing is cached or the cached entry falls outside a
/// timestamp window.
#[derive(Debug, Clone, Copy)]
pub struct DownloadWithinBounds {
    bound: TimestampBound,
}

impl DownloadWithinBounds {
    /// Creates a strategy accepting cached entries inside `bound`.
    pub fn new(bound: TimestampBound) -> Self {
        Self { bound }
    }
}

impl DownloadStrategy for DownloadWithinBounds {
    fn should_download_without_checking_cache(&self) -> bool {
        false
    }

    fn should_download_if_not_cached(&self) -> bool {
        true
    }

    fn should_download_if_cached(&self, entry: &EntryMetadata) -> bool {
        !self.bound.contains(entry.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry_at(timestamp: DateTime<Utc>) -> EntryMetadata {
        EntryMetadata {
            timestamp,
            session: Uuid::new_v4(),
            mime_type: None,
        }
    }

    #[test]
    fn test_always_skips_cache_check() {
        let strategy = DownloadAlways;
        assert!(strategy.should_download_without_checking_cache());
        assert!(strategy.should_download_if_not_cached());
        assert!(strategy.should_download_if_cached(&entry_at(Utc::now())));
    }

    #[test]
    fn test_if_not_cached_accepts_any_cached_copy() {
        let strategy = DownloadIfNotCached;
        assert!(!strategy.should_download_without_checking_cache());
        assert!(strategy.should_download_if_not_cached());
        assert!(!strategy.should_download_if_cached(&entry_at(Utc::now())));
    }

    #[test]
    fn test_never_is_cache_only() {
        let strategy = DownloadNever;
        assert!(!strategy.should_download_without_checking_cache());
        assert!(!strategy.should_download_if_not_cached());
        assert!(!strategy.should_download_if_cached(&entry_at(Utc::now())));
    }

    #[test]
    fn test_bound_not_older_than() {
        let cutoff = Utc::now();
        let bound = TimestampBound::not_older_than(cutoff);

        assert!(bound.contains(cutoff));
        assert!(bound.contains(cutoff + chrono::Duration::seconds(10)));
        assert!(!bound.contains(cutoff - chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_bound_not_newer_than() {
        let cutoff = Utc::now();
        let bound = TimestampBound::not_newer_than(cutoff);

        assert!(bound.contains(cutoff - chrono::Duration::seconds(10)));
        assert!(!bound.contains(cutoff + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_within_bounds_redownloads_stale_entries() {
        let strategy =
            DownloadWithinBounds::new(TimestampBound::max_age(chrono::Duration::minutes(5)));

        let fresh = entry_at(Utc::now());
        let stale = entry_at(Utc::now() - chrono::Duration::hours(1));

        assert!(!strategy.should_download_if_cached(&fresh));
        assert!(strategy.should_download_if_cached(&stale));
        assert!(strategy.should_download_if_not_cached());
    }
}
