mod auth;
mod departments;
mod exports;
mod extract;
mod funding_sources;
mod projects;
mod time_entries;
mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderName, Method, header};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenService;
use crate::config::Config;
use crate::db::Database;
use crate::report_gen::ReportGenerator;

pub use extract::{ApiJson, ApiPath, ApiQuery, AuthUser};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
    pub config: Arc<Config>,
    pub reports: Arc<ReportGenerator>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Result<Self> {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_hours);
        let reports = ReportGenerator::new(&config.export_dir)?
            .with_pandoc_timeout(Duration::from_secs(config.pandoc_timeout_secs));

        Ok(Self {
            db,
            tokens,
            config: Arc::new(config),
            reports: Arc::new(reports),
        })
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth::routes())
        .nest("/projects", projects::routes())
        .nest("/users", users::routes())
        .nest("/departments", departments::routes())
        .nest("/funding-sources", funding_sources::routes())
        .nest("/time-entries", time_entries::routes())
        .nest("/exports", exports::routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Serve the API until the process is interrupted
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind_addr()?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
