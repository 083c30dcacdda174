use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::fetcher::{is_valid_feed, ACCEPT, USER_AGENT};
use crate::news::NewsService;

pub struct AppState {
    pub news: Arc<NewsService>,
    client: reqwest::Client,
    proxy_timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            news: Arc::new(NewsService::new(config)),
            client,
            proxy_timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news", get(api_news))
        .route("/api/proxy", get(api_proxy))
        .route("/api/status", get(api_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// JSON error responses: {"error": "..."} with the matching status code
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// `GET /api/news` - the aggregated article list, newest first.
pub async fn api_news(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let articles = state.news.fetch_news().await;
    Json(json!({ "articles": &*articles }))
}

#[derive(Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// `GET /api/proxy?url=<target>` - re-fetches the target server-side and
/// passes the raw feed through, so browser clients can dodge CORS and
/// anti-bot blocking on the feed hosts.
pub async fn api_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let url = query
        .url
        .ok_or_else(|| ApiError::bad_request("URL parameter is required"))?;

    let response = tokio::time::timeout(
        state.proxy_timeout,
        state
            .client
            .get(&url)
            .header(header::ACCEPT, ACCEPT)
            .send(),
    )
    .await
    .map_err(|_| ApiError::internal("request timed out"))?
    .map_err(|e| {
        error!(url = %url, error = %e, "Proxy fetch failed");
        ApiError::internal(e.to_string())
    })?;

    if !response.status().is_success() {
        return Err(ApiError::internal(format!(
            "HTTP error! status: {}",
            response.status().as_u16()
        )));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/xml")
        .to_string();

    let text = response
        .text()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    if !is_valid_feed(&text) {
        return Err(ApiError::internal("response is not an RSS/Atom feed"));
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CACHE_CONTROL,
            "public, s-maxage=300, stale-while-revalidate=300",
        )
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from(text))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// `GET /api/status` - per-source fetch statistics from the last refresh.
pub async fn api_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.news.fetcher().stats().await;
    Json(json!({ "sources": stats }))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
