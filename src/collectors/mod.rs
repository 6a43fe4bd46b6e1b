// Collectors turn one provider's search API or extraction service into
// RawListings. Per-request failures are absorbed here; only a fault that
// prevents a collector from running at all is returned as an error.

pub mod adzuna;
pub mod extract;
pub mod pacing;
pub mod reed;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::AppError;
use crate::models::listing::{RawListing, SourceId};

/// Hard ceiling on pages fetched per (location, keyword) pair.
pub const MAX_PAGES: u32 = 3;

/// The slice of the search space one collector call should cover.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestRequest {
    pub region: String,
    pub locations: Vec<String>,
    pub keywords: Vec<String>,
}

/// Best-effort output of one collector run.
#[derive(Debug, Default)]
pub struct Harvest {
    pub listings: Vec<RawListing>,
    pub requests: usize,
    pub failed_requests: usize,
}

impl Harvest {
    pub fn absorb(&mut self, other: Harvest) {
        self.listings.extend(other.listings);
        self.requests += other.requests;
        self.failed_requests += other.failed_requests;
    }
}

/// Trait that all job collectors must implement.
#[async_trait]
pub trait JobCollector: Send + Sync {
    fn source(&self) -> SourceId;

    /// Fetch listings for every (location, keyword) pair in the request.
    /// Missing credentials yield an empty harvest, not an error.
    async fn collect(&self, request: &HarvestRequest) -> Result<Harvest, AppError>;
}

/// Fetch pages 1..=`max_pages`, stopping early on a short page or an error.
///
/// `fetch_page` is responsible for pacing; it is awaited sequentially so the
/// pacer sees every outbound call, failed ones included.
pub async fn paginate<F, Fut>(
    label: &str,
    page_size: usize,
    max_pages: u32,
    mut fetch_page: F,
) -> Harvest
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<RawListing>, AppError>>,
{
    let mut harvest = Harvest::default();
    for page in 1..=max_pages {
        harvest.requests += 1;
        match fetch_page(page).await {
            Ok(listings) => {
                let short = listings.len() < page_size;
                harvest.listings.extend(listings);
                if short {
                    break;
                }
            }
            Err(e) => {
                harvest.failed_requests += 1;
                tracing::warn!(query = label, page, "page fetch failed: {e}");
                break;
            }
        }
    }
    harvest
}

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("jobharvest/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Build every configured collector. Collectors without credentials are
/// still built; they log once here and return empty harvests.
pub fn collectors_from_config(config: &Config) -> Result<Vec<Arc<dyn JobCollector>>, AppError> {
    let settings = &config.pipeline;
    let creds = &config.credentials;

    let mut set: Vec<Arc<dyn JobCollector>> = vec![
        Arc::new(adzuna::Adzuna::new(creds, settings.http_timeout())?),
        Arc::new(reed::Reed::new(creds, settings.http_timeout())?),
    ];
    for board in extract::Board::ALL {
        set.push(Arc::new(extract::ExtractCollector::new(
            board,
            creds,
            settings.extract_timeout(),
        )?));
    }
    Ok(set)
}
