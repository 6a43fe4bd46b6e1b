#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};

use jobharvest::collectors::{Harvest, HarvestRequest, JobCollector};
use jobharvest::config::PipelineSettings;
use jobharvest::error::AppError;
use jobharvest::harvest::Pipeline;
use jobharvest::models::listing::{RawListing, SourceId};
use jobharvest::store::memory::{MemoryPublishSink, MemoryRegionCache};

pub fn raw(title: &str, company: &str, location: &str, source_id: SourceId, day: u32) -> RawListing {
    RawListing {
        title: title.to_string(),
        company: company.to_string(),
        location: location.to_string(),
        salary_text: None,
        employment_type: None,
        description_excerpt: String::new(),
        posted_at: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
        apply_url: None,
        source_id,
        expires_at: None,
    }
}

/// Returns the same listings for every request.
pub struct Scripted {
    pub source: SourceId,
    pub listings: Vec<RawListing>,
    pub calls: AtomicUsize,
}

impl Scripted {
    pub fn new(source: SourceId, listings: Vec<RawListing>) -> Arc<Self> {
        Arc::new(Self {
            source,
            listings,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobCollector for Scripted {
    fn source(&self) -> SourceId {
        self.source
    }

    async fn collect(&self, _: &HarvestRequest) -> Result<Harvest, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Harvest {
            listings: self.listings.clone(),
            requests: 1,
            failed_requests: 0,
        })
    }
}

/// Fails every request as a whole-collector fault.
pub struct Broken(pub SourceId);

#[async_trait]
impl JobCollector for Broken {
    fn source(&self) -> SourceId {
        self.0
    }

    async fn collect(&self, _: &HarvestRequest) -> Result<Harvest, AppError> {
        Err(AppError::Internal("upstream returned 503".to_string()))
    }
}

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub cache: Arc<MemoryRegionCache>,
    pub sink: Arc<MemoryPublishSink>,
}

pub fn harness(collectors: Vec<Arc<dyn JobCollector>>) -> Harness {
    let cache = Arc::new(MemoryRegionCache::new());
    let sink = Arc::new(MemoryPublishSink::new());
    let settings = PipelineSettings {
        batch_deadline_secs: 5,
        ..PipelineSettings::default()
    };
    let pipeline = Arc::new(Pipeline::new(&settings, collectors, cache.clone(), sink.clone()));
    Harness {
        pipeline,
        cache,
        sink,
    }
}

pub fn ttl() -> TimeDelta {
    PipelineSettings::default().cache_ttl()
}
