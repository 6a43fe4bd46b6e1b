use std::time::Duration;

use crate::harvest::planner::BATCHES;
use crate::harvest::{HarvestResponse, Pipeline, Trigger};

/// Built-in scheduler: run every planned batch, then merge, then wait.
/// Exits gracefully on SIGINT.
pub async fn run(pipeline: &Pipeline, interval_secs: u64) -> anyhow::Result<()> {
    tracing::info!(
        batches = BATCHES.len(),
        "Harvest cycle started, repeating every {interval_secs}s"
    );

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, exiting gracefully");
                break;
            }
            _ = async {
                run_once(pipeline).await;
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            } => {}
        }
    }

    Ok(())
}

/// One full pass over the plan. Batches run sequentially so the collectors'
/// pacers see one region at a time.
pub async fn run_once(pipeline: &Pipeline) -> Vec<HarvestResponse> {
    let mut responses = Vec::with_capacity(BATCHES.len() + 1);

    for batch in BATCHES {
        let trigger = Trigger::Batch {
            batch_id: batch.id,
            force_refresh: false,
        };
        match pipeline.trigger(trigger).await {
            Ok(resp) => responses.push(resp),
            Err(e) => tracing::error!(batch_id = batch.id, "batch rejected: {e}"),
        }
    }

    match pipeline.trigger(Trigger::Merge).await {
        Ok(resp) => responses.push(resp),
        Err(e) => tracing::error!("merge rejected: {e}"),
    }

    let failures = responses.iter().filter(|r| !r.success).count();
    tracing::info!(runs = responses.len(), failures, "harvest cycle finished");
    responses
}
