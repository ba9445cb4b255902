use std::path::{Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use tracing::debug;

use crate::thumbnail::Thumbnail;

/// Decoded thumbnails are RGBA8.
pub const BYTES_PER_PIXEL: u64 = 4;

/// Byte budget for one collection build.
///
/// A quarter (or `1 / divisor`) of the memory reported by the host, but never
/// more than the collection could use if every image were resident, so a
/// small collection does not reserve the full allotment.
pub fn cache_budget(total_memory: u64, divisor: u64, len: usize, thumbnail_size: u32) -> usize {
    let share = total_memory / divisor.max(1);
    let side = thumbnail_size as u64;
    let full = (len as u64)
        .saturating_mul(side * side)
        .saturating_mul(BYTES_PER_PIXEL);
    usize::try_from(share.min(full)).unwrap_or(usize::MAX)
}

/// What happened to a [`ThumbnailCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Stored; `evicted` older entries were dropped to make room.
    Inserted { evicted: usize },
    /// An entry for the key already existed; the new bitmap was dropped.
    AlreadyPresent,
    /// The bitmap alone exceeds the budget. The cache was emptied and the
    /// bitmap was not stored.
    Rejected { evicted: usize },
}

/// Running counters, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub duplicates: u64,
    pub evictions: u64,
    pub resident_bytes: usize,
    pub entries: usize,
}

/// Path-keyed thumbnail cache bounded by decoded bytes.
///
/// Eviction order is recency of access: both `get` hits and `put` inserts
/// mark an entry most-recently-used. Not synchronised; the owner serialises
/// every call.
pub struct ThumbnailCache {
    budget: usize,
    used: usize,
    entries: LruCache<PathBuf, Arc<Thumbnail>>,
    stats: CacheStats,
}

impl ThumbnailCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget: budget_bytes,
            used: 0,
            entries: LruCache::unbounded(),
            stats: CacheStats::default(),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn resident_bytes(&self) -> usize {
        self.used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `key`, marking it most-recently-used on a hit.
    pub fn get(&mut self, key: &Path) -> Option<Arc<Thumbnail>> {
        match self.entries.get(key) {
            Some(thumb) => {
                self.stats.hits += 1;
                Some(Arc::clone(thumb))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Presence check that does not touch recency or the hit counters.
    pub fn contains(&self, key: &Path) -> bool {
        self.entries.contains(key)
    }

    /// Insert `thumb` under `key` unless a live entry already exists.
    ///
    /// The first writer wins: a duplicate decode for the same path is
    /// dropped rather than replacing what is cached.
    pub fn put(&mut self, key: PathBuf, thumb: Arc<Thumbnail>) -> PutOutcome {
        if self.entries.contains(&key) {
            self.stats.duplicates += 1;
            return PutOutcome::AlreadyPresent;
        }

        let size = thumb.byte_size();
        if size > self.budget {
            let evicted = self.drain();
            debug!(
                path = %key.display(),
                size,
                budget = self.budget,
                evicted,
                "Thumbnail larger than cache budget, cache emptied"
            );
            return PutOutcome::Rejected { evicted };
        }

        let mut evicted = 0;
        while self.used + size > self.budget {
            match self.entries.pop_lru() {
                Some((old_key, old)) => {
                    self.used -= old.byte_size();
                    evicted += 1;
                    debug!(path = %old_key.display(), bytes = old.byte_size(), "Evicted thumbnail");
                }
                None => break,
            }
        }
        self.stats.evictions += evicted as u64;

        self.used += size;
        self.entries.put(key, thumb);
        self.stats.insertions += 1;
        PutOutcome::Inserted { evicted }
    }

    /// Change the byte budget, evicting least-recently-used entries until the
    /// resident set fits. Returns how many were evicted.
    pub fn set_budget(&mut self, budget_bytes: usize) -> usize {
        self.budget = budget_bytes;
        let mut evicted = 0;
        while self.used > self.budget {
            match self.entries.pop_lru() {
                Some((_, old)) => {
                    self.used -= old.byte_size();
                    evicted += 1;
                }
                None => break,
            }
        }
        self.stats.evictions += evicted as u64;
        evicted
    }

    /// Drop every entry. Returns how many were removed.
    pub fn evict_all(&mut self) -> usize {
        let evicted = self.drain();
        debug!(evicted, "Thumbnail cache cleared");
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident_bytes: self.used,
            entries: self.entries.len(),
            ..self.stats
        }
    }

    fn drain(&mut self) -> usize {
        let evicted = self.entries.len();
        self.entries.clear();
        self.used = 0;
        self.stats.evictions += evicted as u64;
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumb(side: u32, shade: u8) -> Arc<Thumbnail> {
        Arc::new(Thumbnail::solid(side, [shade, shade, shade, 255]))
    }

    /// Bytes of one `side × side` thumbnail.
    fn bytes(side: u32) -> usize {
        side as usize * side as usize * 4
    }

    #[test]
    fn put_then_get_returns_same_bitmap() {
        let mut cache = ThumbnailCache::new(bytes(10) * 4);
        let b = thumb(10, 1);
        assert!(cache.get(Path::new("/k.jpg")).is_none());
        assert_eq!(
            cache.put("/k.jpg".into(), Arc::clone(&b)),
            PutOutcome::Inserted { evicted: 0 }
        );
        let got = cache.get(Path::new("/k.jpg")).unwrap();
        assert!(Arc::ptr_eq(&got, &b));
    }

    #[test]
    fn first_writer_wins() {
        let mut cache = ThumbnailCache::new(bytes(10) * 4);
        let b1 = thumb(10, 1);
        let b2 = thumb(10, 2);
        cache.put("/k.jpg".into(), Arc::clone(&b1));
        assert_eq!(cache.put("/k.jpg".into(), b2), PutOutcome::AlreadyPresent);
        let got = cache.get(Path::new("/k.jpg")).unwrap();
        assert!(Arc::ptr_eq(&got, &b1));
        assert_eq!(cache.stats().duplicates, 1);
        assert_eq!(cache.resident_bytes(), bytes(10));
    }

    #[test]
    fn eviction_follows_access_order_not_insertion_order() {
        let mut cache = ThumbnailCache::new(bytes(10) * 3);
        cache.put("/a".into(), thumb(10, 1));
        cache.put("/b".into(), thumb(10, 2));
        cache.put("/c".into(), thumb(10, 3));

        // Touch the oldest insertion so "/b" becomes least recently used.
        assert!(cache.get(Path::new("/a")).is_some());

        assert_eq!(
            cache.put("/d".into(), thumb(10, 4)),
            PutOutcome::Inserted { evicted: 1 }
        );
        assert!(cache.contains(Path::new("/a")));
        assert!(!cache.contains(Path::new("/b")));
        assert!(cache.contains(Path::new("/c")));
        assert!(cache.contains(Path::new("/d")));
    }

    #[test]
    fn budget_is_bytes_not_entries() {
        // Room for one large or several small thumbnails.
        let mut cache = ThumbnailCache::new(bytes(20));
        for i in 0..4 {
            cache.put(format!("/small{i}").into(), thumb(10, i as u8));
        }
        assert_eq!(cache.len(), 4);

        assert_eq!(
            cache.put("/large".into(), thumb(20, 9)),
            PutOutcome::Inserted { evicted: 4 }
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resident_bytes(), bytes(20));
    }

    #[test]
    fn resident_bytes_never_exceed_budget() {
        let budget = bytes(16) * 3 + 123;
        let mut cache = ThumbnailCache::new(budget);
        let sides = [8u32, 16, 4, 20, 12, 16, 2, 24, 9, 30, 1, 16];
        for (i, side) in sides.iter().cycle().take(200).enumerate() {
            cache.put(format!("/img{}", i % 37).into(), thumb(*side, i as u8));
            if i % 5 == 0 {
                cache.get(Path::new(&format!("/img{}", (i * 7) % 37)));
            }
            assert!(
                cache.resident_bytes() <= budget,
                "resident {} > budget {budget} after put #{i}",
                cache.resident_bytes()
            );
        }
    }

    #[test]
    fn oversized_bitmap_degrades_to_empty_cache() {
        let mut cache = ThumbnailCache::new(bytes(10) * 2);
        cache.put("/a".into(), thumb(10, 1));
        cache.put("/b".into(), thumb(10, 2));

        assert_eq!(
            cache.put("/huge".into(), thumb(40, 3)),
            PutOutcome::Rejected { evicted: 2 }
        );
        assert!(cache.is_empty());
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn evict_all_clears_and_counts() {
        let mut cache = ThumbnailCache::new(bytes(10) * 4);
        cache.put("/a".into(), thumb(10, 1));
        cache.put("/b".into(), thumb(10, 2));
        assert_eq!(cache.evict_all(), 2);
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.resident_bytes, 0);
    }

    #[test]
    fn shrinking_the_budget_evicts_oldest_first() {
        let mut cache = ThumbnailCache::new(bytes(10) * 3);
        cache.put("/a".into(), thumb(10, 1));
        cache.put("/b".into(), thumb(10, 2));
        cache.put("/c".into(), thumb(10, 3));
        assert_eq!(cache.set_budget(bytes(10)), 2);
        assert!(cache.contains(Path::new("/c")));
        assert_eq!(cache.budget(), bytes(10));
    }

    #[test]
    fn budget_is_capped_by_collection_size() {
        let gib = 1024 * 1024 * 1024;
        // Small collection: 10 thumbnails of 200² RGBA.
        assert_eq!(cache_budget(8 * gib, 4, 10, 200), 10 * 200 * 200 * 4);
        // Large collection: a quarter of memory.
        assert_eq!(cache_budget(gib, 4, 1_000_000, 200), (gib / 4) as usize);
        assert_eq!(cache_budget(gib, 4, 0, 200), 0);
    }
}
