pub mod cycle;
pub mod dedup;
pub mod executor;
pub mod merge;
pub mod planner;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collectors::JobCollector;
use crate::config::PipelineSettings;
use crate::error::AppError;
use crate::harvest::executor::{BatchExecutor, BatchReport};
use crate::harvest::merge::{MergeCoordinator, MergeReport};
use crate::store::{PublishSink, RegionCache};

/// What an external scheduler asks the pipeline to do.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Trigger {
    Batch {
        #[serde(rename = "batchId")]
        batch_id: u32,
        #[serde(rename = "forceRefresh", default)]
        force_refresh: bool,
    },
    Merge,
}

/// Always-well-formed answer to a trigger, failures included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestResponse {
    pub success: bool,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
}

impl HarvestResponse {
    fn failed(mode: &'static str, error: &AppError) -> Self {
        Self {
            success: false,
            mode,
            error: Some(error.to_string()),
            batch: None,
            merge: None,
        }
    }
}

pub struct Pipeline {
    pub executor: BatchExecutor,
    pub merger: MergeCoordinator,
    pub cache: Arc<dyn RegionCache>,
}

impl Pipeline {
    pub fn new(
        settings: &PipelineSettings,
        collectors: Vec<Arc<dyn JobCollector>>,
        cache: Arc<dyn RegionCache>,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        let executor = BatchExecutor::new(
            collectors,
            Arc::clone(&cache),
            settings.cache_ttl(),
            settings.batch_deadline(),
            &settings.pipeline_tag,
        );
        let merger = MergeCoordinator::new(
            Arc::clone(&cache),
            sink,
            settings.publish_limit,
            planner::total_regions(),
        );
        Self {
            executor,
            merger,
            cache,
        }
    }

    /// Run a trigger. Invalid requests are errors; storage failures are
    /// reported inside the response with `success: false`.
    pub async fn trigger(&self, trigger: Trigger) -> Result<HarvestResponse, AppError> {
        match trigger {
            Trigger::Batch {
                batch_id,
                force_refresh,
            } => match self.executor.run(batch_id, force_refresh).await {
                Ok(report) => Ok(HarvestResponse {
                    success: true,
                    mode: "batch",
                    error: None,
                    batch: Some(report),
                    merge: None,
                }),
                Err(e @ AppError::BadRequest(_)) => Err(e),
                Err(e) => {
                    tracing::error!(batch_id, "batch failed: {e}");
                    Ok(HarvestResponse::failed("batch", &e))
                }
            },
            Trigger::Merge => match self.merger.run().await {
                Ok(report) => Ok(HarvestResponse {
                    success: true,
                    mode: "merge",
                    error: None,
                    batch: None,
                    merge: Some(report),
                }),
                Err(e) => {
                    tracing::error!("merge failed: {e}");
                    Ok(HarvestResponse::failed("merge", &e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trigger_payloads() {
        let batch: Trigger =
            serde_json::from_str(r#"{"mode":"batch","batchId":3,"forceRefresh":true}"#).unwrap();
        assert!(matches!(batch, Trigger::Batch { batch_id: 3, force_refresh: true }));

        let lazy: Trigger = serde_json::from_str(r#"{"mode":"batch","batchId":1}"#).unwrap();
        assert!(matches!(lazy, Trigger::Batch { force_refresh: false, .. }));

        let merge: Trigger = serde_json::from_str(r#"{"mode":"merge"}"#).unwrap();
        assert!(matches!(merge, Trigger::Merge));

        assert!(serde_json::from_str::<Trigger>(r#"{"mode":"purge"}"#).is_err());
    }

    #[test]
    fn failed_response_carries_message() {
        let resp = HarvestResponse::failed("merge", &AppError::Storage("disk full".into()));
        let value = serde_json::to_value(resp).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Storage error: disk full");
        assert!(value.get("merge").is_none());
    }
}
