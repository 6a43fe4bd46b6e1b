use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::harvest::dedup::{dedup, sort_by_recency};
use crate::harvest::executor::count_by_source;
use crate::models::listing::Listing;
use crate::models::published::PublishedListing;
use crate::store::{PublishSink, RegionCache};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub total_unique: usize,
    pub regions_found: usize,
    pub total_regions: usize,
    pub regions_contributed: Vec<String>,
    pub all_complete: bool,
    pub per_source: BTreeMap<String, usize>,
    pub duplicates_removed: usize,
    pub dropped: usize,
    pub generation: Uuid,
}

/// Fresh regions needed before a merge counts as complete: all but one.
pub fn is_complete(fresh_regions: usize, total_regions: usize) -> bool {
    fresh_regions + 1 >= total_regions
}

pub struct MergeCoordinator {
    cache: Arc<dyn RegionCache>,
    sink: Arc<dyn PublishSink>,
    publish_limit: usize,
    total_regions: usize,
}

impl MergeCoordinator {
    pub fn new(
        cache: Arc<dyn RegionCache>,
        sink: Arc<dyn PublishSink>,
        publish_limit: usize,
        total_regions: usize,
    ) -> Self {
        Self {
            cache,
            sink,
            publish_limit,
            total_regions,
        }
    }

    /// Combine every fresh region into one ranked set and publish it.
    ///
    /// Regions are read in batch order and concatenated before dedup, so when
    /// equally complete duplicates appear in two regions the earlier batch
    /// keeps its copy.
    pub async fn run(&self) -> Result<MergeReport, AppError> {
        let entries = self.cache.list_all_fresh().await?;

        let regions_contributed: Vec<String> = entries
            .iter()
            .filter(|e| !e.listings.is_empty())
            .map(|e| e.region.clone())
            .collect();
        let regions_found = entries.len();

        let combined: Vec<Listing> = entries.into_iter().flat_map(|e| e.listings).collect();
        let (mut listings, duplicates_removed) = dedup(combined);
        sort_by_recency(&mut listings);
        listings.truncate(self.publish_limit);

        let before = listings.len();
        listings.retain(Listing::is_publishable);
        let dropped = before - listings.len();

        let published: Vec<PublishedListing> = listings.iter().map(PublishedListing::from).collect();
        let outcome = self.sink.replace_external(&published).await?;

        let all_complete = is_complete(regions_found, self.total_regions);
        if !all_complete {
            tracing::warn!(
                regions_found,
                total_regions = self.total_regions,
                "merge ran with more than one region missing or expired"
            );
        }
        tracing::info!(
            count = published.len(),
            regions_found,
            duplicates = duplicates_removed,
            removed = outcome.removed,
            generation = %outcome.generation,
            "merge published"
        );

        Ok(MergeReport {
            total_unique: published.len(),
            regions_found,
            total_regions: self.total_regions,
            regions_contributed,
            all_complete,
            per_source: count_by_source(listings.iter().map(|l| l.source_id)),
            duplicates_removed,
            dropped,
            generation: outcome.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta, Utc};

    use crate::models::listing::{SourceId, sample};
    use crate::models::region_cache::RegionCacheEntry;
    use crate::store::memory::{MemoryPublishSink, MemoryRegionCache};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    async fn seed(cache: &MemoryRegionCache, region: &str, batch: i32, listings: Vec<Listing>) {
        cache
            .put(RegionCacheEntry::new(region, batch, listings, "test", TimeDelta::hours(12)))
            .await
            .unwrap();
    }

    #[test]
    fn completeness_tolerates_one_missing_region() {
        assert!(is_complete(9, 9));
        assert!(is_complete(8, 9));
        assert!(!is_complete(7, 9));
        assert!(is_complete(0, 1));
    }

    #[tokio::test]
    async fn merges_dedups_sorts_and_truncates() {
        let cache = Arc::new(MemoryRegionCache::new());
        let sink = Arc::new(MemoryPublishSink::new());
        seed(&cache, "london", 1, vec![
            sample("Electrician", "Volt Co", SourceId::Reed, day(3)),
            sample("Electrical Engineer", "Gridline", SourceId::Adzuna, day(9)),
        ])
        .await;
        seed(&cache, "midlands", 5, vec![
            sample("electrician", "VOLT CO", SourceId::Indeed, day(4)),
            sample("Maintenance Electrician", "Forge Ltd", SourceId::Reed, day(6)),
        ])
        .await;

        let merger = MergeCoordinator::new(cache, sink.clone(), 2, 9);
        let report = merger.run().await.unwrap();

        assert_eq!(report.total_unique, 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.regions_found, 2);
        assert!(!report.all_complete);

        let titles: Vec<String> = sink.external().into_iter().map(|l| l.title).collect();
        assert_eq!(titles, ["Electrical Engineer", "Maintenance Electrician"]);
        assert_eq!(report.per_source.get("adzuna"), Some(&1));
        assert_eq!(report.per_source.get("reed"), Some(&1));
    }

    #[tokio::test]
    async fn expired_regions_are_excluded() {
        let cache = Arc::new(MemoryRegionCache::new());
        let sink = Arc::new(MemoryPublishSink::new());
        seed(&cache, "london", 1, vec![sample("A", "X", SourceId::Reed, day(1))]).await;

        let mut stale = RegionCacheEntry::new("wales", 9, vec![sample("B", "Y", SourceId::Reed, day(2))], "test", TimeDelta::hours(1));
        stale.expires_at = Utc::now() - TimeDelta::seconds(5);
        cache.put(stale).await.unwrap();

        let report = MergeCoordinator::new(cache, sink.clone(), 500, 2).run().await.unwrap();
        assert_eq!(report.total_unique, 1);
        assert_eq!(report.regions_contributed, ["london"]);
        assert!(report.all_complete);
    }

    #[tokio::test]
    async fn sink_failure_surfaces_as_error() {
        let cache = Arc::new(MemoryRegionCache::new());
        let sink = Arc::new(MemoryPublishSink::new());
        sink.set_fail_writes(true);
        let merger = MergeCoordinator::new(cache, sink, 500, 9);
        assert!(matches!(merger.run().await, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn republish_replaces_previous_generation() {
        let cache = Arc::new(MemoryRegionCache::new());
        let sink = Arc::new(MemoryPublishSink::new());
        seed(&cache, "london", 1, vec![sample("A", "X", SourceId::Reed, day(1))]).await;

        let merger = MergeCoordinator::new(cache, sink.clone(), 500, 1);
        let first = merger.run().await.unwrap();
        let first_id = sink.external()[0].id;
        let second = merger.run().await.unwrap();

        assert_ne!(first.generation, second.generation);
        assert_eq!(sink.external().len(), 1);
        assert_ne!(sink.external()[0].id, first_id);
    }
}
