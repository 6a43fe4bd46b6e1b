use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;

use crate::error::AppError;
use crate::harvest::planner::{BATCHES, Batch};
use crate::models::region_cache::{RegionCacheEntry, RegionStatus};
use crate::routes::api::AppState;

fn status(batch: &Batch, entry: Option<&RegionCacheEntry>) -> RegionStatus {
    let now = Utc::now();
    RegionStatus {
        region: batch.region.to_string(),
        batch_number: batch.id as i32,
        fresh: entry.is_some_and(|e| e.is_fresh_at(now)),
        listing_count: entry.map_or(0, |e| e.listings.len()),
        expires_at: entry.map(|e| e.expires_at),
    }
}

/// Cache state for every planned region, in batch order.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<RegionStatus>>, AppError> {
    let stored = state.pipeline.cache.list_all().await?;
    let statuses = BATCHES
        .iter()
        .map(|batch| status(batch, stored.iter().find(|e| e.region == batch.region)))
        .collect();
    Ok(Json(statuses))
}

pub async fn get(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<RegionStatus>, AppError> {
    let batch = BATCHES
        .iter()
        .find(|b| b.region == region)
        .ok_or_else(|| AppError::NotFound(format!("Region '{region}' is not in the plan")))?;

    let stored = state.pipeline.cache.list_all().await?;
    Ok(Json(status(batch, stored.iter().find(|e| e.region == region))))
}

pub async fn batches() -> Json<&'static [Batch]> {
    Json(BATCHES)
}
