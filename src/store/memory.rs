//! In-memory stores for tests and local dry runs. Data is lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::published::{PublishOutcome, PublishedListing};
use crate::models::region_cache::RegionCacheEntry;
use crate::store::{PublishSink, RegionCache};

fn poisoned() -> AppError {
    AppError::Storage("memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryRegionCache {
    entries: RwLock<HashMap<String, RegionCacheEntry>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryRegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail, to exercise storage-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Physically stored rows, regardless of expiry.
    pub fn stored_len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn check_reads(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Storage("region cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RegionCache for MemoryRegionCache {
    async fn get(&self, region: &str) -> Result<Option<RegionCacheEntry>, AppError> {
        self.check_reads()?;
        let now = Utc::now();
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .get(region)
            .filter(|e| e.is_fresh_at(now))
            .cloned())
    }

    async fn put(&self, entry: RegionCacheEntry) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("region cache write rejected".to_string()));
        }
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(entry.region.clone(), entry);
        Ok(())
    }

    async fn list_all_fresh(&self) -> Result<Vec<RegionCacheEntry>, AppError> {
        let now = Utc::now();
        let mut fresh: Vec<RegionCacheEntry> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.is_fresh_at(now))
            .collect();
        fresh.sort_by_key(|e| e.batch_number);
        Ok(fresh)
    }

    async fn list_all(&self) -> Result<Vec<RegionCacheEntry>, AppError> {
        self.check_reads()?;
        let mut all: Vec<RegionCacheEntry> = self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|e| e.batch_number);
        Ok(all)
    }
}

#[derive(Debug, Clone)]
pub struct StoredRow {
    pub listing: PublishedListing,
    pub is_external: bool,
    pub generation: Option<Uuid>,
}

#[derive(Default)]
pub struct MemoryPublishSink {
    rows: RwLock<Vec<StoredRow>>,
    current_generation: RwLock<Option<Uuid>>,
    fail_writes: AtomicBool,
}

impl MemoryPublishSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Add a row that was authored internally rather than harvested.
    pub fn insert_internal(&self, listing: PublishedListing) -> Result<(), AppError> {
        self.rows.write().map_err(|_| poisoned())?.push(StoredRow {
            listing,
            is_external: false,
            generation: None,
        });
        Ok(())
    }

    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows.read().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn external(&self) -> Vec<PublishedListing> {
        self.rows()
            .into_iter()
            .filter(|r| r.is_external)
            .map(|r| r.listing)
            .collect()
    }

    pub fn current_generation(&self) -> Option<Uuid> {
        self.current_generation.read().ok().and_then(|g| *g)
    }
}

#[async_trait]
impl PublishSink for MemoryPublishSink {
    async fn replace_external(
        &self,
        listings: &[PublishedListing],
    ) -> Result<PublishOutcome, AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("publish sink write rejected".to_string()));
        }

        let generation = Uuid::new_v4();
        // Both locks are held for the whole swap so readers see old or new, never empty.
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let mut current = self.current_generation.write().map_err(|_| poisoned())?;

        let before = rows.len();
        rows.retain(|r| !r.is_external);
        let removed = (before - rows.len()) as u64;

        rows.extend(listings.iter().cloned().map(|listing| StoredRow {
            listing,
            is_external: true,
            generation: Some(generation),
        }));
        *current = Some(generation);

        Ok(PublishOutcome {
            generation,
            inserted: listings.len(),
            removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    use crate::models::listing::{SourceId, sample};

    fn listing(title: &str) -> crate::models::listing::Listing {
        sample(title, "Volt Co", SourceId::Reed, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap())
    }

    #[tokio::test]
    async fn put_then_get_round_trips_in_order() {
        let cache = MemoryRegionCache::new();
        let listings = vec![listing("B"), listing("A"), listing("C")];
        cache
            .put(RegionCacheEntry::new("london", 1, listings.clone(), "test", TimeDelta::hours(12)))
            .await
            .unwrap();

        let entry = cache.get("london").await.unwrap().unwrap();
        assert_eq!(entry.listings, listings);
        assert_eq!(entry.batch_number, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_but_still_stored() {
        let cache = MemoryRegionCache::new();
        let mut entry = RegionCacheEntry::new("wales", 9, vec![listing("A")], "test", TimeDelta::hours(12));
        entry.expires_at = Utc::now() - TimeDelta::minutes(1);
        cache.put(entry).await.unwrap();

        assert!(cache.get("wales").await.unwrap().is_none());
        assert!(cache.list_all_fresh().await.unwrap().is_empty());
        assert_eq!(cache.list_all().await.unwrap().len(), 1);
        assert_eq!(cache.stored_len(), 1);
    }

    #[tokio::test]
    async fn put_replaces_whole_entry() {
        let cache = MemoryRegionCache::new();
        cache
            .put(RegionCacheEntry::new("london", 1, vec![listing("A"), listing("B")], "v1", TimeDelta::hours(1)))
            .await
            .unwrap();
        cache
            .put(RegionCacheEntry::new("london", 1, vec![listing("C")], "v2", TimeDelta::hours(1)))
            .await
            .unwrap();

        let entry = cache.get("london").await.unwrap().unwrap();
        assert_eq!(entry.listings.len(), 1);
        assert_eq!(entry.source, "v2");
    }

    #[tokio::test]
    async fn replace_leaves_internal_rows_alone() {
        let sink = MemoryPublishSink::new();
        sink.insert_internal(PublishedListing::from(&listing("In-house role"))).unwrap();

        let first: Vec<PublishedListing> = ["A", "B"].iter().map(|t| PublishedListing::from(&listing(t))).collect();
        sink.replace_external(&first).await.unwrap();
        let second = vec![PublishedListing::from(&listing("C"))];
        let outcome = sink.replace_external(&second).await.unwrap();

        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(sink.external().len(), 1);
        assert_eq!(sink.rows().len(), 2);
        assert_eq!(sink.current_generation(), Some(outcome.generation));
    }

    #[test]
    fn poisoned_sink_reports_storage_error() {
        let sink = MemoryPublishSink::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = sink.rows.write().unwrap();
            panic!("writer died holding the lock");
        }));

        let err = sink.insert_internal(PublishedListing::from(&listing("In-house role")));
        assert!(matches!(err, Err(AppError::Storage(_))));
    }
}
