//! Last-known detection result for a page, served while the live channel is
//! down.

use std::time::Duration;

use chrono::{DateTime, Utc};
use formscout_core::{CachedResult, DetectionResult};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: DetectionResult,
    stored_at: Instant,
    cached_at: DateTime<Utc>,
}

/// Holds at most one result. Newer generations replace older ones; an older
/// generation never overwrites a newer one.
#[derive(Debug, Clone)]
pub struct ResultCache {
    entry: Option<CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    /// Store `result` unless a newer generation is already cached. Returns
    /// whether it was stored.
    pub fn store(&mut self, result: DetectionResult, now: Instant, wall: DateTime<Utc>) -> bool {
        if let Some(existing) = &self.entry
            && existing.result.generation > result.generation
        {
            return false;
        }
        self.entry = Some(CacheEntry {
            result,
            stored_at: now,
            cached_at: wall,
        });
        true
    }

    /// The cached result, flagged stale once older than the TTL. Stale
    /// results are still returned.
    pub fn get(&self, now: Instant) -> Option<CachedResult> {
        self.entry.as_ref().map(|e| CachedResult {
            result: e.result.clone(),
            cached_at: e.cached_at,
            stale: now.saturating_duration_since(e.stored_at) > self.ttl,
        })
    }

    pub fn generation(&self) -> Option<u64> {
        self.entry.as_ref().map(|e| e.result.generation)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscout_core::{Jurisdiction, PageInstanceId};

    fn result(generation: u64) -> DetectionResult {
        DetectionResult {
            page_instance_id: PageInstanceId(1),
            url: "https://mytax.dc.gov/".into(),
            jurisdiction: Jurisdiction {
                code: "DC".into(),
                prior: 80,
            },
            confidence: 70,
            is_registration_form: true,
            sections: vec![],
            field_count: 0,
            timestamp: Utc::now(),
            generation,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_then_stale() {
        let mut cache = ResultCache::new(Duration::from_secs(300));
        assert!(cache.get(Instant::now()).is_none());

        cache.store(result(1), Instant::now(), Utc::now());
        assert!(!cache.get(Instant::now()).unwrap().stale);

        tokio::time::advance(Duration::from_secs(301)).await;
        let cached = cache.get(Instant::now()).unwrap();
        assert!(cached.stale);
        assert_eq!(cached.result.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn older_generation_does_not_replace_newer() {
        let mut cache = ResultCache::new(Duration::from_secs(300));
        assert!(cache.store(result(3), Instant::now(), Utc::now()));
        assert!(!cache.store(result(2), Instant::now(), Utc::now()));
        assert_eq!(cache.generation(), Some(3));
        assert!(cache.store(result(4), Instant::now(), Utc::now()));
        assert_eq!(cache.generation(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forgets_result() {
        let mut cache = ResultCache::new(Duration::from_secs(300));
        cache.store(result(1), Instant::now(), Utc::now());
        cache.clear();
        assert!(cache.get(Instant::now()).is_none());
    }
}
