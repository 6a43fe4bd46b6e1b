use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::collectors::pacing::Pacer;
use crate::collectors::{Harvest, HarvestRequest, JobCollector, MAX_PAGES, http_client, paginate};
use crate::config::Credentials;
use crate::error::AppError;
use crate::models::listing::{RawListing, SourceId};
use crate::normalize;

const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs/gb/search";
const PAGE_SIZE: usize = 50;
const MIN_INTERVAL: Duration = Duration::from_millis(500);

pub struct Adzuna {
    credentials: Option<(String, String)>,
    client: reqwest::Client,
    pacer: Pacer,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    #[serde(default)]
    title: String,
    company: Option<DisplayName>,
    location: Option<DisplayName>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    contract_type: Option<String>,
    contract_time: Option<String>,
    #[serde(default)]
    description: String,
    created: Option<String>,
    redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    #[serde(default)]
    display_name: String,
}

impl Adzuna {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, AppError> {
        let pair = match (&credentials.adzuna_app_id, &credentials.adzuna_app_key) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => {
                Some((id.clone(), key.clone()))
            }
            _ => {
                tracing::warn!(source = "adzuna", "ADZUNA_APP_ID/ADZUNA_APP_KEY not set, collector disabled");
                None
            }
        };

        Ok(Self {
            credentials: pair,
            client: http_client(timeout)?,
            pacer: Pacer::steady(MIN_INTERVAL),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the collector at another host serving the same search API.
    pub fn with_endpoint(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_page(
        &self,
        (app_id, app_key): (&str, &str),
        location: &str,
        keyword: &str,
        page: u32,
        today: NaiveDate,
    ) -> Result<Vec<RawListing>, AppError> {
        self.pacer.acquire().await;

        let per_page = PAGE_SIZE.to_string();
        let resp = self
            .client
            .get(format!("{}/{page}", self.base_url))
            .query(&[
                ("app_id", app_id),
                ("app_key", app_key),
                ("what", keyword),
                ("where", location),
                ("results_per_page", per_page.as_str()),
                ("sort_by", "date"),
                ("content-type", "application/json"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Adzuna request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!("Adzuna returned {}", resp.status())));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Adzuna response: {e}")))?;

        Ok(body.results.into_iter().map(|job| to_raw(job, today)).collect())
    }
}

#[async_trait]
impl JobCollector for Adzuna {
    fn source(&self) -> SourceId {
        SourceId::Adzuna
    }

    async fn collect(&self, request: &HarvestRequest) -> Result<Harvest, AppError> {
        let Some((app_id, app_key)) = &self.credentials else {
            return Ok(Harvest::default());
        };
        let today = Utc::now().date_naive();

        let mut harvest = Harvest::default();
        for location in &request.locations {
            for keyword in &request.keywords {
                let label = format!("{keyword}@{location}");
                let pair = paginate(&label, PAGE_SIZE, MAX_PAGES, |page| {
                    self.fetch_page((app_id.as_str(), app_key.as_str()), location, keyword, page, today)
                })
                .await;
                harvest.absorb(pair);
            }
        }

        tracing::info!(
            source = "adzuna",
            region = %request.region,
            count = harvest.listings.len(),
            failed = harvest.failed_requests,
            "collect finished"
        );
        Ok(harvest)
    }
}

fn to_raw(job: AdzunaJob, today: NaiveDate) -> RawListing {
    let employment_type = normalize::employment_type(
        job.contract_type
            .as_deref()
            .or(job.contract_time.as_deref()),
    );

    RawListing {
        title: normalize::truncate_excerpt(&job.title),
        company: job.company.map(|c| c.display_name).unwrap_or_default(),
        location: job.location.map(|l| l.display_name).unwrap_or_default(),
        salary_text: Some(normalize::format_salary(job.salary_min, job.salary_max)),
        employment_type,
        description_excerpt: normalize::truncate_excerpt(&job.description),
        posted_at: job
            .created
            .as_deref()
            .map(|c| normalize::parse_posted_date(c, today))
            .unwrap_or(today),
        apply_url: job.redirect_url,
        source_id: SourceId::Adzuna,
        expires_at: None,
    }
}
