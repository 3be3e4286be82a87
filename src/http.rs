//! HTTP surface over [`Scout`].

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ScrapeError;
use crate::ops::Scout;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn into_api_error(e: ScrapeError) -> ApiError {
    let status = match &e {
        ScrapeError::BadUrl(_) => StatusCode::BAD_REQUEST,
        ScrapeError::NavigationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    interactive: bool,
}

#[derive(Deserialize)]
struct SuggestQuery {
    query: String,
}

#[derive(Deserialize)]
struct UrlRequest {
    url: String,
}

pub fn router(scout: Arc<Scout>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/suggest", get(suggest))
        .route("/content", post(content))
        .route("/graphic", post(graphic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(scout)
}

async fn health(State(scout): State<Arc<Scout>>) -> Json<serde_json::Value> {
    let report = scout.health().await;
    Json(serde_json::json!({ "status": "ok", "queues": report }))
}

async fn search(
    State(scout): State<Arc<Scout>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let capture = scout
        .search(&req.query, req.interactive)
        .await
        .map_err(into_api_error)?;
    Ok(Json(serde_json::json!(capture)))
}

async fn suggest(
    State(scout): State<Arc<Scout>>,
    Query(q): Query<SuggestQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let capture = scout.suggest(&q.query).await.map_err(into_api_error)?;
    Ok(Json(serde_json::json!(capture)))
}

async fn content(
    State(scout): State<Arc<Scout>>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let capture = scout.page_content(&req.url).await.map_err(into_api_error)?;
    Ok(Json(serde_json::json!(capture)))
}

async fn graphic(
    State(scout): State<Arc<Scout>>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let capture = scout
        .network_graphic(&req.url)
        .await
        .map_err(into_api_error)?;
    Ok(Json(serde_json::json!(capture)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_by_error_kind() {
        let (status, _) = into_api_error(ScrapeError::BadUrl("x".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = into_api_error(ScrapeError::NavigationTimeout("x".into()));
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        let (status, _) = into_api_error(ScrapeError::Authentication("x".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn search_request_defaults_to_direct() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "acme"}"#).unwrap();
        assert!(!req.interactive);
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "acme", "interactive": true}"#).unwrap();
        assert!(req.interactive);
    }
}
