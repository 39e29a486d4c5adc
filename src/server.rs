use std::path::Path;

use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::{
    error::{ErrorKind, ScanError},
    filter::{Category, HostQuery},
    netdetect::DEFAULT_RANGE,
    ping::{self, PingOutcome},
    ports::DEFAULT_PORTS,
    session::{ScanRequest, ScanSession},
    topology::{Viewport, ViewState},
    types::ExportDocument,
};

#[derive(Clone)]
pub struct AppState {
    session: ScanSession,
}

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub range: Option<String>,
    pub ports: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TopologyParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: Category,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub selected: Option<String>,
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Busy => StatusCode::CONFLICT,
            ErrorKind::ToolUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ToolExecution | ErrorKind::OutputTooLarge | ErrorKind::Cancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "details": kind,
        });
        if kind == ErrorKind::ToolUnavailable {
            body["installInstructions"] = json!({
                "windows": "Download from https://nmap.org/download.html",
                "macos": "brew install nmap",
                "linux": "sudo apt-get install nmap (Ubuntu/Debian) or sudo yum install nmap (CentOS/RHEL)",
            });
        }
        (status, Json(body)).into_response()
    }
}

/// JSON API under `/api`, without static files.
pub fn router(session: ScanSession) -> Router {
    let state = AppState { session };
    let api = Router::new()
        .route("/health", get(get_health))
        .route("/scan", get(get_scan))
        .route("/scan/stop", post(post_stop))
        .route("/status", get(get_status))
        .route("/hosts", get(get_hosts))
        .route("/topology", get(get_topology))
        .route("/export", get(get_export))
        .route("/ping/{ip}", get(get_ping))
        .with_state(state);

    Router::new().nest("/api", api).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

pub async fn spawn_server(bind: &str, ui_dir: &Path, session: ScanSession) -> Result<()> {
    let static_svc = ServeDir::new(ui_dir).append_index_html_on_directories(true);
    let app = router(session).fallback_service(static_svc);

    info!(%bind, ui_dir = %ui_dir.display(), "serving dashboard");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_health(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.session.health().await)
}

async fn get_scan(State(app): State<AppState>, Query(params): Query<ScanParams>) -> Response {
    let request = ScanRequest {
        range: params.range.unwrap_or_else(|| DEFAULT_RANGE.to_string()),
        ports: params.ports.unwrap_or_else(|| DEFAULT_PORTS.to_string()),
    };
    match app.session.run_scan(&request).await {
        Ok(result) => (StatusCode::OK, Json(json!({ "success": true, "data": &*result }))).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn post_stop(State(app): State<AppState>) -> impl IntoResponse {
    let stopped = app.session.stop().await;
    Json(json!({ "success": true, "stopped": stopped }))
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.session.status().await)
}

fn query_error(rejection: QueryRejection) -> ScanError {
    ScanError::validation("query", rejection.body_text())
}

async fn get_hosts(
    State(app): State<AppState>,
    query: Result<Query<HostQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return query_error(rejection).into_response(),
    };
    match app.session.hosts(&query).await {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_topology(
    State(app): State<AppState>,
    params: Result<Query<TopologyParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => return query_error(rejection).into_response(),
    };
    let query = HostQuery::new(params.search, params.category);
    let defaults = Viewport::default();
    let viewport = Viewport::new(
        params.width.unwrap_or(defaults.width),
        params.height.unwrap_or(defaults.height),
    );
    let mut view = ViewState::default();
    view.click(params.selected.as_deref());
    Json(app.session.topology(&query, viewport, &mut view).await).into_response()
}

async fn get_export(State(app): State<AppState>) -> Response {
    let Some(result) = app.session.current().await else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let doc = ExportDocument::new(&result);
    let disposition = format!("attachment; filename=\"{}\"", doc.file_name());
    ([(header::CONTENT_DISPOSITION, disposition)], Json(doc)).into_response()
}

async fn get_ping(UrlPath(ip): UrlPath<String>) -> Response {
    match ping::ping_host(&ip).await {
        Ok(PingOutcome::Reachable {
            ip,
            latency_ms,
            timestamp,
            raw_output,
        }) => Json(json!({
            "success": true,
            "data": {
                "ip": ip,
                "latency": latency_ms,
                "timestamp": timestamp,
                "rawOutput": raw_output,
            }
        }))
        .into_response(),
        Ok(PingOutcome::Unreachable { ip, timestamp }) => Json(json!({
            "success": false,
            "data": {
                "ip": ip,
                "error": "Host unreachable",
                "timestamp": timestamp,
            }
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}
