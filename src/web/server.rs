//! Axum web server for text2sql.
//!
//! Every translation endpoint answers HTTP 200 with the response envelope;
//! clarifications and errors are part of the body, not the status code.

use axum::{
    extract::State,
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::{DimensionDefinition, MetricDefinition, PhysicalTable};
use crate::ir::{Response, StructuredRequirement};
use crate::pipeline::Pipeline;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Fixed anchor date; the server's local date when unset.
    pub anchor: Option<NaiveDate>,
}

impl AppState {
    fn anchor(&self, requested: Option<NaiveDate>) -> NaiveDate {
        requested
            .or(self.anchor)
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Build the axum router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/text2sql", post(translate))
        .route("/api/v1/compile", post(compile))
        .route("/api/v1/catalog", get(list_catalog))
        .layer(cors)
        .with_state(state)
}

/// Start the web server.
pub async fn serve(state: AppState, bind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!(address = %bind, "text2sql server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
}

/// GET /health
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    text: String,
    /// Conversation context from the caller. Accepted for compatibility;
    /// translation is stateless.
    #[serde(default)]
    context: Option<serde_json::Value>,
    #[serde(default)]
    anchor_date: Option<NaiveDate>,
}

/// POST /api/v1/text2sql - Translate free text
async fn translate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TranslateRequest>,
) -> Json<Response> {
    if req.context.is_some() {
        tracing::debug!("ignoring request context");
    }
    let anchor = state.anchor(req.anchor_date);
    Json(state.pipeline.process(&req.text, anchor).await)
}

#[derive(Debug, Deserialize)]
struct CompileRequest {
    #[serde(flatten)]
    requirement: StructuredRequirement,
    #[serde(default)]
    anchor_date: Option<NaiveDate>,
}

/// POST /api/v1/compile - Compile a structured requirement
async fn compile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompileRequest>,
) -> Json<Response> {
    let anchor = state.anchor(req.anchor_date);
    Json(state.pipeline.process_requirement(&req.requirement, anchor))
}

#[derive(Serialize)]
struct CatalogListing<'a> {
    tables: Vec<&'a PhysicalTable>,
    metrics: Vec<&'a MetricDefinition>,
    dimensions: Vec<&'a DimensionDefinition>,
}

/// GET /api/v1/catalog - List the catalog
async fn list_catalog(State(state): State<Arc<AppState>>) -> HttpResponse {
    let catalog = state.pipeline.catalog();
    Json(CatalogListing {
        tables: catalog.tables().collect(),
        metrics: catalog.metrics().collect(),
        dimensions: catalog.dimensions().collect(),
    })
    .into_response()
}
