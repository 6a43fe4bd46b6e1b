pub mod harvest;
pub mod regions;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::require_trigger_secret;
use crate::harvest::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub trigger_secret: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        // Triggers
        .route("/harvest", post(harvest::trigger))
        // Cache and plan
        .route("/regions", get(regions::list))
        .route("/regions/{region}", get(regions::get))
        .route("/batches", get(regions::batches))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_trigger_secret,
        ))
        .with_state(state);

    Router::new().nest("/api/v1", protected)
}
