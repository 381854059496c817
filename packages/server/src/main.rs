//! Vetting pipeline HTTP server.
//!
//! Exposes the pipeline operations over JSON: task creation, status
//! callbacks from the scraper, queue stats, the retry sweep, and the
//! scoring entry points.

mod config;
mod rate_limit;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vetting_pipeline::{
    HttpTaskQueue, Pipeline, PipelineConfig, PostgresEvidenceStore, ScoringEngine, ScoringRules,
};

use crate::config::Config;
use crate::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vetting_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting vetting pipeline server");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let store = PostgresEvidenceStore::new(pool.clone());
    store
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    let queue = HttpTaskQueue::new(
        config.queue_service_url.clone(),
        config.queue_api_token.clone(),
    );
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        store,
        queue,
        ScoringEngine::new(ScoringRules::v1()),
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        db_pool: pool,
    };

    let limiter = Arc::new(FixedWindowLimiter::per_minute(config.rate_limit_per_minute));

    // Rate limit only the scrape-trigger path.
    let task_creation = Router::new()
        .route("/tasks", post(routes::create_task))
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));

    let app = Router::new()
        .merge(task_creation)
        .route("/tasks/:id/status", put(routes::update_task_status))
        .route("/tasks/retry-failed", post(routes::retry_failed_tasks))
        .route("/queue/stats", get(routes::queue_stats))
        .route("/operators/:id/score", post(routes::score_operator))
        .route("/operators/score-batch", post(routes::batch_score_operators))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
