// Storage seams for the two mutable resources of the pipeline: the per-region
// cache written by batch runs and the consumer-facing published set written
// by the merge.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::published::{PublishOutcome, PublishedListing};
use crate::models::region_cache::RegionCacheEntry;

#[async_trait]
pub trait RegionCache: Send + Sync {
    /// The entry for `region`, or `None` if missing or expired.
    async fn get(&self, region: &str) -> Result<Option<RegionCacheEntry>, AppError>;

    /// Replace whatever is stored for `entry.region`. Never a partial update.
    async fn put(&self, entry: RegionCacheEntry) -> Result<(), AppError>;

    /// Every unexpired entry, ordered by batch number.
    async fn list_all_fresh(&self) -> Result<Vec<RegionCacheEntry>, AppError>;

    /// Every stored entry, stale ones included.
    async fn list_all(&self) -> Result<Vec<RegionCacheEntry>, AppError>;
}

#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Swap the externally sourced published set for `listings`. Rows that
    /// were authored internally are left alone.
    async fn replace_external(
        &self,
        listings: &[PublishedListing],
    ) -> Result<PublishOutcome, AppError>;
}
