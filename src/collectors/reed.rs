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

const BASE_URL: &str = "https://www.reed.co.uk/api/1.0/search";
const PAGE_SIZE: usize = 100;
const MIN_INTERVAL: Duration = Duration::from_millis(250);

pub struct Reed {
    api_key: Option<String>,
    client: reqwest::Client,
    pacer: Pacer,
    base_url: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ReedJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReedJob {
    #[serde(default)]
    job_title: String,
    #[serde(default)]
    employer_name: String,
    #[serde(default)]
    location_name: String,
    minimum_salary: Option<f64>,
    maximum_salary: Option<f64>,
    date: Option<String>,
    expiration_date: Option<String>,
    #[serde(default)]
    job_description: String,
    job_url: Option<String>,
}

impl Reed {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, AppError> {
        let api_key = credentials.reed_api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(source = "reed", "REED_API_KEY not set, collector disabled");
        }

        Ok(Self {
            api_key,
            client: http_client(timeout)?,
            pacer: Pacer::steady(MIN_INTERVAL),
            base_url: BASE_URL.to_string(),
            page_size: PAGE_SIZE,
        })
    }

    /// Point the collector at another host with a different page size.
    pub fn with_endpoint(mut self, base_url: &str, page_size: usize) -> Self {
        self.base_url = base_url.to_string();
        self.page_size = page_size.max(1);
        self
    }

    async fn fetch_page(
        &self,
        api_key: &str,
        location: &str,
        keyword: &str,
        page: u32,
        today: NaiveDate,
    ) -> Result<Vec<RawListing>, AppError> {
        self.pacer.acquire().await;

        let skip = (page.saturating_sub(1) as usize * self.page_size).to_string();
        let take = self.page_size.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .basic_auth(api_key, Some(""))
            .query(&[
                ("keywords", keyword),
                ("locationName", location),
                ("distanceFromLocation", "15"),
                ("resultsToTake", take.as_str()),
                ("resultsToSkip", skip.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Reed request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!("Reed returned {}", resp.status())));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Reed response: {e}")))?;

        Ok(body.results.into_iter().map(|job| to_raw(job, today)).collect())
    }
}

#[async_trait]
impl JobCollector for Reed {
    fn source(&self) -> SourceId {
        SourceId::Reed
    }

    async fn collect(&self, request: &HarvestRequest) -> Result<Harvest, AppError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Harvest::default());
        };
        let today = Utc::now().date_naive();

        let mut harvest = Harvest::default();
        for location in &request.locations {
            for keyword in &request.keywords {
                let label = format!("{keyword}@{location}");
                let pair = paginate(&label, self.page_size, MAX_PAGES, |page| {
                    self.fetch_page(api_key, location, keyword, page, today)
                })
                .await;
                harvest.absorb(pair);
            }
        }

        tracing::info!(
            source = "reed",
            region = %request.region,
            count = harvest.listings.len(),
            failed = harvest.failed_requests,
            "collect finished"
        );
        Ok(harvest)
    }
}

fn to_raw(job: ReedJob, today: NaiveDate) -> RawListing {
    RawListing {
        title: job.job_title,
        company: job.employer_name,
        location: job.location_name,
        salary_text: Some(normalize::format_salary(job.minimum_salary, job.maximum_salary)),
        employment_type: None,
        description_excerpt: normalize::truncate_excerpt(&job.job_description),
        posted_at: job
            .date
            .as_deref()
            .map(|d| normalize::parse_posted_date(d, today))
            .unwrap_or(today),
        apply_url: job.job_url,
        source_id: SourceId::Reed,
        expires_at: job
            .expiration_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%d/%m/%Y").ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(n: usize) -> Value {
        json!({
            "jobId": n,
            "jobTitle": format!("Electrician {n}"),
            "employerName": "Brightwire Ltd",
            "locationName": "Leeds",
            "minimumSalary": 30000.0,
            "maximumSalary": 30000.0,
            "date": "14/10/2024",
            "expirationDate": "25/11/2026",
            "jobDescription": "Domestic and commercial installs",
            "jobUrl": format!("https://www.reed.co.uk/jobs/{n}")
        })
    }

    async fn serve(total: usize, hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/search",
            get(move |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    if !headers.contains_key("authorization") {
                        return axum::Json(json!({ "results": [] }));
                    }
                    let skip: usize = q["resultsToSkip"].parse().unwrap();
                    let take: usize = q["resultsToTake"].parse().unwrap();
                    let results: Vec<Value> = (skip..total.min(skip + take)).map(job).collect();
                    axum::Json(json!({ "results": results, "totalResults": total }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/search")
    }

    fn credentials() -> Credentials {
        Credentials {
            reed_api_key: Some("test-key".to_string()),
            ..Credentials::default()
        }
    }

    fn request() -> HarvestRequest {
        HarvestRequest {
            region: "yorkshire".to_string(),
            locations: vec!["Leeds".to_string()],
            keywords: vec!["electrician".to_string()],
        }
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve(25, hits.clone()).await;
        let reed = Reed::new(&credentials(), Duration::from_secs(5))
            .unwrap()
            .with_endpoint(&url, 10);

        let harvest = reed.collect(&request()).await.unwrap();
        assert_eq!(harvest.listings.len(), 25);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let first = &harvest.listings[0];
        assert_eq!(first.salary_text.as_deref(), Some("£30,000"));
        assert_eq!(first.posted_at, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap());
        assert_eq!(first.expires_at, NaiveDate::from_ymd_opt(2026, 11, 25));
    }

    #[tokio::test]
    async fn stops_at_page_ceiling() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve(500, hits.clone()).await;
        let reed = Reed::new(&credentials(), Duration::from_secs(5))
            .unwrap()
            .with_endpoint(&url, 10);

        let harvest = reed.collect(&request()).await.unwrap();
        assert_eq!(harvest.listings.len(), 30);
        assert_eq!(hits.load(Ordering::SeqCst), MAX_PAGES as usize);
    }

    #[tokio::test]
    async fn unreachable_host_degrades_to_empty() {
        let reed = Reed::new(&credentials(), Duration::from_millis(500))
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/search", 10);

        let harvest = reed.collect(&request()).await.unwrap();
        assert!(harvest.listings.is_empty());
        assert_eq!(harvest.failed_requests, 1);
    }
}
