use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jobharvest::config::{Command, Config};
use jobharvest::harvest::planner::BATCHES;
use jobharvest::harvest::{HarvestResponse, Pipeline, Trigger, cycle};
use jobharvest::routes::api::AppState;
use jobharvest::store::postgres::{PgPublishSink, PgRegionCache};
use jobharvest::{collectors, db, routes};

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: PgPool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobharvest=info,tower_http=info"));
    // stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_response(response: &HarvestResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    if !response.success {
        anyhow::bail!("{} run failed", response.mode);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.json_logs());

    let command = config.resolved_command();
    if let Command::Plan = command {
        println!("{}", serde_json::to_string_pretty(BATCHES)?);
        return Ok(());
    }

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let pipeline = Arc::new(Pipeline::new(
        &config.pipeline,
        collectors::collectors_from_config(&config)?,
        Arc::new(PgRegionCache::new(pool.clone())),
        Arc::new(PgPublishSink::new(pool.clone())),
    ));

    match command {
        Command::Serve { listen_addr } => {
            if config.trigger_secret.is_none() {
                tracing::warn!("TRIGGER_SECRET not set, /api/v1 is open");
            }
            let state = AppState {
                pipeline,
                trigger_secret: config.trigger_secret.clone(),
            };

            let readyz_pool = pool.clone();
            let app = Router::new()
                .route("/healthz", get(healthz))
                .route("/readyz", get(move || readyz(readyz_pool.clone())))
                .merge(routes::api::router(state))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
            tracing::info!("Listening on {listen_addr}");
            axum::serve(listener, app).await?;
        }
        Command::Batch { id, force } => {
            let trigger = Trigger::Batch {
                batch_id: id,
                force_refresh: force,
            };
            print_response(&pipeline.trigger(trigger).await?)?;
        }
        Command::Merge => {
            print_response(&pipeline.trigger(Trigger::Merge).await?)?;
        }
        Command::Cycle { interval } => {
            cycle::run(&pipeline, interval).await?;
        }
        Command::Plan => {}
    }

    Ok(())
}
