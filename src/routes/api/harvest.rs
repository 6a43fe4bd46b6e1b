use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::error::AppError;
use crate::harvest::{HarvestResponse, Trigger};
use crate::routes::api::AppState;

/// POST /api/v1/harvest
///
/// Run one batch or a merge. Storage failures still answer 200 with
/// `success: false`; a malformed trigger or unknown batch answers 400.
pub async fn trigger(
    State(state): State<AppState>,
    payload: Result<Json<Trigger>, JsonRejection>,
) -> Result<Json<HarvestResponse>, AppError> {
    let Json(trigger) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let response = state.pipeline.trigger(trigger).await?;
    Ok(Json(response))
}
