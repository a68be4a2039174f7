//! HTTP API over the matching pipeline.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cli::{Service, bootstrap, health};
use crate::config::Settings;
use crate::entities::request::MatchQuery;
use crate::entities::response::MatchResponse;

const INVALID_REQUEST: &str = "INVALID_REQUEST";

type SharedService = Arc<Service>;

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/api/v1/health", get(health_status))
        .route("/api/v1/match", post(match_diagnosis))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn service_info(State(service): State<SharedService>) -> Json<Value> {
    let orchestrator = &service.orchestrator;
    Json(json!({
        "service": "disease-matcher",
        "version": env!("CARGO_PKG_VERSION"),
        "architecture": orchestrator.architecture(),
        "model": orchestrator.model(),
        "endpoints": {
            "health": "/api/v1/health",
            "match": "/api/v1/match",
        },
    }))
}

async fn health_status(State(service): State<SharedService>) -> Json<Value> {
    let report = health::service_report(&service);
    let status = if report.all_healthy() {
        "healthy"
    } else {
        "degraded"
    };
    Json(json!({
        "status": status,
        "llm_configured": service.llm_configured,
        "model": service.orchestrator.model(),
        "components": report.rows,
    }))
}

async fn match_diagnosis(
    State(service): State<SharedService>,
    payload: Result<Json<MatchQuery>, JsonRejection>,
) -> (StatusCode, Json<MatchResponse>) {
    let orchestrator = &service.orchestrator;
    let query = match payload {
        Ok(Json(query)) => query,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected match request body");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(orchestrator.error_response(INVALID_REQUEST, rejection.body_text())),
            );
        }
    };
    if let Err(err) = query.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(orchestrator.error_response(err.code(), err.to_string())),
        );
    }

    (StatusCode::OK, Json(orchestrator.search(&query).await))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Loads the service and serves the API until Ctrl-C.
pub async fn serve(host: &str, port: u16) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    let service = Arc::new(bootstrap(&settings).await?);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(address = %listener.local_addr()?, "Disease matcher listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
