use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::listing::Listing;

/// A consumer-facing row written by the merge phase. Ids are regenerated on
/// every publish and are not stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedListing {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub posted_date: NaiveDate,
    pub external_url: Option<String>,
    pub source: String,
}

impl From<&Listing> for PublishedListing {
    fn from(listing: &Listing) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: listing.title.clone(),
            company: listing.company.clone(),
            location: listing.location.clone(),
            salary: listing.salary_text.clone(),
            kind: listing.employment_type.clone(),
            description: listing.description_excerpt.clone(),
            posted_date: listing.posted_at,
            external_url: listing.apply_url.clone(),
            source: listing.source_id.to_string(),
        }
    }
}

/// What a sink reports back after replacing the external set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub generation: Uuid,
    pub inserted: usize,
    pub removed: u64,
}
