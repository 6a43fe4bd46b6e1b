use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::listing::Listing;

/// Everything harvested for one region by its most recent batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCacheEntry {
    pub region: String,
    pub batch_number: i32,
    pub listings: Vec<Listing>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RegionCacheEntry {
    pub fn new(
        region: &str,
        batch_number: i32,
        listings: Vec<Listing>,
        source: &str,
        ttl: TimeDelta,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            region: region.to_string(),
            batch_number,
            listings,
            source: source.to_string(),
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Cache freshness summary used by the regions endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStatus {
    pub region: String,
    pub batch_number: i32,
    pub fresh: bool,
    pub listing_count: usize,
    pub expires_at: Option<DateTime<Utc>>,
}
