use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};

use crate::collectors::pacing::Pacer;
use crate::collectors::{Harvest, HarvestRequest, JobCollector, http_client};
use crate::config::Credentials;
use crate::error::AppError;
use crate::models::listing::{RawListing, SourceId};
use crate::normalize;

/// Characters that encodeURIComponent does NOT encode.
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Concurrent location lookups per group.
pub const GROUP_SIZE: usize = 5;
const GROUP_PAUSE: Duration = Duration::from_secs(2);

const EXTRACT_PROMPT: &str = "Extract every job listing shown on this search results page. \
For each listing return the job title, hiring company, location, salary as written, \
job type, the posted date text exactly as shown (for example '3 days ago'), \
a short description and the absolute URL of the listing.";

/// Job boards that have no query API and are read through the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Indeed,
    Totaljobs,
    Cvlibrary,
}

impl Board {
    pub const ALL: [Board; 3] = [Board::Indeed, Board::Totaljobs, Board::Cvlibrary];

    pub fn source(&self) -> SourceId {
        match self {
            Board::Indeed => SourceId::Indeed,
            Board::Totaljobs => SourceId::Totaljobs,
            Board::Cvlibrary => SourceId::Cvlibrary,
        }
    }

    pub fn search_url(&self, location: &str, keyword: &str) -> String {
        match self {
            Board::Indeed => format!(
                "https://uk.indeed.com/jobs?q={}&l={}&fromage=14&sort=date",
                encode_component(keyword),
                encode_component(location)
            ),
            Board::Totaljobs => format!(
                "https://www.totaljobs.com/jobs/{}/in-{}?sort=2",
                slug(keyword),
                slug(location)
            ),
            Board::Cvlibrary => format!(
                "https://www.cv-library.co.uk/{}-jobs-in-{}?order=date",
                slug(keyword),
                slug(location)
            ),
        }
    }
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_URI_COMPONENT_SET).to_string()
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

pub struct ExtractCollector {
    board: Board,
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
    pacer: Pacer,
}

impl ExtractCollector {
    pub fn new(board: Board, credentials: &Credentials, timeout: Duration) -> Result<Self, AppError> {
        let api_key = credentials.extract_api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(source = %board.source(), "EXTRACT_API_KEY not set, collector disabled");
        }

        Ok(Self {
            board,
            api_key,
            endpoint: format!("{}/v1/extract", credentials.extract_api_url.trim_end_matches('/')),
            client: http_client(timeout)?,
            pacer: Pacer::grouped(GROUP_SIZE as u32, GROUP_PAUSE),
        })
    }

    /// Replace the pacing policy, e.g. to shorten the pause between groups.
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    async fn lookup(
        &self,
        api_key: &str,
        location: &str,
        keyword: &str,
        today: NaiveDate,
    ) -> Result<Vec<RawListing>, AppError> {
        self.pacer.acquire().await;

        let target = self.board.search_url(location, keyword);
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "urls": [target],
                "prompt": EXTRACT_PROMPT,
                "schema": listing_schema(),
            }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Extraction request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "Extraction service returned {}",
                resp.status()
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse extraction response: {e}")))?;

        Ok(parse_extraction(&data, self.board.source(), location, today))
    }
}

#[async_trait]
impl JobCollector for ExtractCollector {
    fn source(&self) -> SourceId {
        self.board.source()
    }

    async fn collect(&self, request: &HarvestRequest) -> Result<Harvest, AppError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Harvest::default());
        };
        let today = Utc::now().date_naive();

        let mut harvest = Harvest::default();
        for keyword in &request.keywords {
            for group in request.locations.chunks(GROUP_SIZE) {
                let results = join_all(
                    group
                        .iter()
                        .map(|location| self.lookup(api_key, location, keyword, today)),
                )
                .await;

                for (location, result) in group.iter().zip(results) {
                    harvest.requests += 1;
                    match result {
                        Ok(listings) => harvest.listings.extend(listings),
                        Err(e) => {
                            harvest.failed_requests += 1;
                            tracing::warn!(
                                source = %self.board.source(),
                                query = %format!("{keyword}@{location}"),
                                "lookup failed: {e}"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(
            source = %self.board.source(),
            region = %request.region,
            count = harvest.listings.len(),
            failed = harvest.failed_requests,
            "collect finished"
        );
        Ok(harvest)
    }
}

fn listing_schema() -> Value {
    let text = json!({ "type": "string" });
    json!({
        "type": "object",
        "properties": {
            "jobs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": text,
                        "company": text,
                        "location": text,
                        "salary": text,
                        "jobType": text,
                        "postedDate": text,
                        "description": text,
                        "url": text
                    },
                    "required": ["title", "company"]
                }
            }
        }
    })
}

/// Pull listings out of an extraction response. Results are unreliable by
/// nature: anything that is not an object is skipped, missing fields become
/// empty and are filtered later.
fn parse_extraction(data: &Value, source: SourceId, location: &str, today: NaiveDate) -> Vec<RawListing> {
    let jobs = data
        .get("data")
        .and_then(|d| d.get("jobs"))
        .or_else(|| data.get("jobs"))
        .and_then(|v| v.as_array());

    let Some(jobs) = jobs else {
        return Vec::new();
    };

    jobs.iter()
        .filter(|job| job.is_object())
        .map(|job| {
            let text = |key: &str| job.get(key).and_then(|v| v.as_str()).map(str::trim);
            let number = |key: &str| job.get(key).and_then(|v| v.as_f64());

            RawListing {
                title: text("title").unwrap_or_default().to_string(),
                company: text("company").unwrap_or_default().to_string(),
                location: text("location")
                    .filter(|l| !l.is_empty())
                    .unwrap_or(location)
                    .to_string(),
                salary_text: Some(normalize::salary_or_text(
                    number("salaryMin"),
                    number("salaryMax"),
                    text("salary"),
                )),
                employment_type: normalize::employment_type(text("jobType")),
                description_excerpt: normalize::truncate_excerpt(
                    text("description").unwrap_or_default(),
                ),
                posted_at: normalize::parse_posted_date(
                    text("postedDate").unwrap_or_default(),
                    today,
                ),
                apply_url: text("url").filter(|u| u.starts_with("http")).map(String::from),
                source_id: source,
                expires_at: text("expiresAt")
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            }
        })
        .collect()
}
