//! Time-bucketed thumbnail cache.
//!
//! Write-once per bucket, bounded by entry count, cleared wholesale when the
//! video changes. There is no per-entry eviction: once full, new frames are
//! returned to the caller but not stored.

use std::collections::HashMap;
use std::sync::Mutex;

use super::Thumbnail;
use crate::core::types::TimeMs;

/// Floors `time_ms` to the start of its bucket
pub fn bucket_key(time_ms: TimeMs, interval_ms: TimeMs) -> TimeMs {
    if interval_ms <= 0 {
        return time_ms;
    }
    time_ms.div_euclid(interval_ms) * interval_ms
}

pub struct ThumbnailCache {
    inner: Mutex<CacheInner>,
    interval_ms: TimeMs,
    max_size: usize,
}

struct CacheInner {
    entries: HashMap<TimeMs, Thumbnail>,
    /// Bumped by every `clear`; frames generated under an older epoch are
    /// refused
    epoch: u64,
}

impl ThumbnailCache {
    pub fn new(interval_ms: TimeMs, max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                epoch: 0,
            }),
            interval_ms,
            max_size,
        }
    }

    /// Bucket key for a time under this cache's interval
    pub fn key_for(&self, time_ms: TimeMs) -> TimeMs {
        bucket_key(time_ms, self.interval_ms)
    }

    /// Current generation of the cache contents; capture it before starting
    /// work whose result will be inserted
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn get(&self, key: TimeMs) -> Option<Thumbnail> {
        self.lock().entries.get(&key).cloned()
    }

    /// Stores `thumbnail` under `key` unless the key is taken, the cache is
    /// full, or the cache was cleared since `epoch`. Returns the entry now
    /// cached for `key`, if any.
    pub fn insert_if_absent(
        &self,
        key: TimeMs,
        thumbnail: Thumbnail,
        epoch: u64,
    ) -> Option<Thumbnail> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::debug!("Dropping thumbnail {} from a cleared cache generation", key);
            return None;
        }
        if let Some(existing) = inner.entries.get(&key) {
            return Some(existing.clone());
        }
        if inner.entries.len() >= self.max_size {
            tracing::debug!("Thumbnail cache full ({}), not caching {}", self.max_size, key);
            return None;
        }
        inner.entries.insert(key, thumbnail.clone());
        Some(thumbnail)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A poisoned map still holds valid thumbnails
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn thumb(time_ms: TimeMs) -> Thumbnail {
        Thumbnail::new(time_ms, RgbImage::new(2, 2))
    }

    #[test]
    fn test_bucket_key() {
        assert_eq!(bucket_key(125_000, 10_000), 120_000);
        assert_eq!(bucket_key(119_999, 10_000), 110_000);
        assert_eq!(bucket_key(0, 10_000), 0);
        assert_eq!(bucket_key(300_000, 10_000), 300_000);
    }

    #[test]
    fn test_insert_is_write_once() {
        let cache = ThumbnailCache::new(10_000, 10);
        let key = cache.key_for(125_000);
        let epoch = cache.epoch();
        cache.insert_if_absent(key, thumb(1), epoch);
        let kept = cache.insert_if_absent(key, thumb(2), epoch).unwrap();

        assert_eq!(kept.time_ms(), 1);
        assert_eq!(cache.get(120_000).unwrap().time_ms(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_size_bound() {
        let cache = ThumbnailCache::new(10_000, 3);
        let epoch = cache.epoch();
        for i in 0..5 {
            cache.insert_if_absent(i * 10_000, thumb(i), epoch);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(40_000).is_none());
        assert!(cache.get(0).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = ThumbnailCache::new(10_000, 3);
        cache.insert_if_absent(0, thumb(0), cache.epoch());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_from_before_clear_is_refused() {
        let cache = ThumbnailCache::new(10_000, 3);
        let before = cache.epoch();
        cache.clear();

        assert!(cache.insert_if_absent(0, thumb(0), before).is_none());
        assert!(cache.is_empty());

        let now = cache.epoch();
        assert_ne!(now, before);
        assert!(cache.insert_if_absent(0, thumb(1), now).is_some());
        assert_eq!(cache.len(), 1);
    }
}
