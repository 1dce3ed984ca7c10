// SPDX-License-Identifier: MIT

//! HTTP front end for the trip planner
//!
//! Runs are addressed by `thread_id`. Every response carries the run status
//! and the full trip state; suspended runs also carry the pending interrupt.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::flow::{FlowError, Resume, RunReport};
use crate::trip::config::AppConfig;
use crate::trip::pipeline::TripPlanner;
use crate::trip::state::{TripState, TripUpdate};

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<TripPlanner>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub user_input: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub resume: Value,
}

/// Error body: `{"error": CODE, "message": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Flow(FlowError),
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self::Flow(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Flow(err) => match err {
                FlowError::RunNotFound(_) => StatusCode::NOT_FOUND,
                FlowError::AlreadyComplete(_)
                | FlowError::NotSuspended { .. }
                | FlowError::Conflict { .. }
                | FlowError::RunExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_REQUEST",
            Self::Flow(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::BadRequest(msg) => msg.clone(),
            Self::Flow(err) => err.to_string(),
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", message);
        }
        (status, Json(json!({"error": self.code(), "message": message}))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/plan", post(create_plan))
        .route("/api/plan/{thread_id}", get(get_plan))
        .route("/api/plan/{thread_id}/approve", post(approve_plan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    config: &AppConfig,
    planner: Arc<TripPlanner>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if config.runs.ttl_secs.is_some() {
        let planner = planner.clone();
        let every = Duration::from_secs(config.runs.prune_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = planner.prune_expired().await {
                    log::warn!("Pruning expired runs failed: {}", e);
                }
            }
        });
    }

    let app = router(AppState { planner });
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_body(report: RunReport<TripState>) -> Result<Json<Value>, ApiError> {
    let mut body = json!({
        "thread_id": report.run_id,
        "status": report.status.as_str(),
        "state": serde_json::to_value(&report.state).map_err(FlowError::from)?,
    });
    if let Some(payload) = report.interrupt {
        body["interrupt"] = Value::Array(vec![
            serde_json::to_value(payload).map_err(FlowError::from)?
        ]);
    }
    if let Some(error) = report.error {
        body["error"] = Value::String(error);
    }
    Ok(Json(body))
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok", "service": "tripflow"}))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<CreatePlanRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_input = req.user_input.trim();
    if user_input.is_empty() {
        return Err(ApiError::BadRequest("user_input must not be empty".into()));
    }

    let initial = TripUpdate::from_input(user_input);
    let report = match req.thread_id.as_deref() {
        Some(id) if !id.is_empty() => state.planner.start_run(id, initial).await?,
        _ => state.planner.create_run(initial).await?,
    };
    run_body(report)
}

pub async fn approve_plan(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .planner
        .resume_run(&thread_id, Resume::new(req.resume))
        .await?;
    run_body(report)
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.planner.get_run(&thread_id).await? {
        Some(report) => run_body(report),
        None => Ok(Json(json!({
            "thread_id": thread_id,
            "status": "not_found",
            "state": null,
        }))),
    }
}
