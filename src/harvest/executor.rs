use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::collectors::{Harvest, HarvestRequest, JobCollector};
use crate::error::AppError;
use crate::harvest::dedup::{dedup, sort_by_recency};
use crate::harvest::planner;
use crate::models::listing::{SourceId, validate_all};
use crate::models::region_cache::RegionCacheEntry;
use crate::store::RegionCache;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: u32,
    pub region: String,
    /// True when a fresh cache entry short-circuited the run.
    pub cached: bool,
    pub total_listings: usize,
    pub per_source: BTreeMap<String, usize>,
    pub dropped: usize,
    pub duplicates_removed: usize,
    pub failed_providers: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

pub struct BatchExecutor {
    collectors: Vec<Arc<dyn JobCollector>>,
    cache: Arc<dyn RegionCache>,
    ttl: TimeDelta,
    deadline: Duration,
    pipeline_tag: String,
}

impl BatchExecutor {
    pub fn new(
        collectors: Vec<Arc<dyn JobCollector>>,
        cache: Arc<dyn RegionCache>,
        ttl: TimeDelta,
        deadline: Duration,
        pipeline_tag: &str,
    ) -> Self {
        Self {
            collectors,
            cache,
            ttl,
            deadline,
            pipeline_tag: pipeline_tag.to_string(),
        }
    }

    /// Harvest one planned batch into its region's cache entry.
    ///
    /// Collector faults only shrink the result. The run fails only for an
    /// unknown batch id or a failed cache write.
    pub async fn run(&self, batch_id: u32, force_refresh: bool) -> Result<BatchReport, AppError> {
        let batch = planner::batch(batch_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown batch {batch_id}; valid ids are 1..={}",
                planner::total_regions()
            ))
        })?;

        if !force_refresh {
            match self.cache.get(batch.region).await {
                Ok(Some(entry)) => {
                    tracing::info!(
                        batch_id,
                        region = batch.region,
                        count = entry.listings.len(),
                        "fresh cache entry, skipping harvest"
                    );
                    return Ok(cached_report(batch_id, &entry));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(batch_id, region = batch.region, "cache read failed, harvesting anyway: {e}");
                }
            }
        }

        let request = batch.request();
        let (harvest, failed_providers) = self.fan_out(&request).await;

        let (listings, dropped) = validate_all(harvest.listings);
        let (mut listings, duplicates_removed) = dedup(listings);
        sort_by_recency(&mut listings);

        let per_source = count_by_source(listings.iter().map(|l| l.source_id));
        let total_listings = listings.len();
        if total_listings == 0 {
            tracing::warn!(batch_id, region = batch.region, "batch produced no listings, caching empty set");
        }

        let entry = RegionCacheEntry::new(
            batch.region,
            batch_id as i32,
            listings,
            &self.pipeline_tag,
            self.ttl,
        );
        let expires_at = entry.expires_at;
        self.cache.put(entry).await?;

        tracing::info!(
            batch_id,
            region = batch.region,
            count = total_listings,
            dropped,
            duplicates = duplicates_removed,
            failed = failed_providers.len(),
            "batch cached"
        );

        Ok(BatchReport {
            batch_id,
            region: batch.region.to_string(),
            cached: false,
            total_listings,
            per_source,
            dropped,
            duplicates_removed,
            failed_providers,
            expires_at,
        })
    }

    /// Run every collector concurrently until all finish or the soft
    /// deadline passes. Whatever finished in time is kept.
    async fn fan_out(&self, request: &HarvestRequest) -> (Harvest, Vec<String>) {
        let mut set = JoinSet::new();
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let request = request.clone();
            set.spawn(async move {
                let source = collector.source();
                let outcome = match AssertUnwindSafe(collector.collect(&request))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(harvest)) => Ok(harvest),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("collector panicked".to_string()),
                };
                (source, outcome)
            });
        }

        let deadline = Instant::now() + self.deadline;
        let mut harvest = Harvest::default();
        let mut failed: Vec<String> = Vec::new();
        let mut reported: Vec<SourceId> = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((source, outcome)))) => {
                    reported.push(source);
                    match outcome {
                        Ok(part) => harvest.absorb(part),
                        Err(e) => {
                            tracing::warn!(source = %source, region = %request.region, "collector failed: {e}");
                            failed.push(source.to_string());
                        }
                    }
                }
                Ok(Some(Err(join_err))) => {
                    tracing::error!(region = %request.region, "collector task lost: {join_err}");
                }
                Ok(None) => break,
                Err(_) => {
                    for collector in &self.collectors {
                        let source = collector.source();
                        if !reported.contains(&source) {
                            tracing::warn!(source = %source, region = %request.region, "collector missed the batch deadline");
                            failed.push(source.to_string());
                        }
                    }
                    set.abort_all();
                    break;
                }
            }
        }

        (harvest, failed)
    }
}

fn cached_report(batch_id: u32, entry: &RegionCacheEntry) -> BatchReport {
    BatchReport {
        batch_id,
        region: entry.region.clone(),
        cached: true,
        total_listings: entry.listings.len(),
        per_source: count_by_source(entry.listings.iter().map(|l| l.source_id)),
        dropped: 0,
        duplicates_removed: 0,
        failed_providers: Vec::new(),
        expires_at: entry.expires_at,
    }
}

pub(crate) fn count_by_source(sources: impl Iterator<Item = SourceId>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for source in sources {
        *counts.entry(source.to_string()).or_insert(0) += 1;
    }
    counts
}
