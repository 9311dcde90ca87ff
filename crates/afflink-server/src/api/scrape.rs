use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    Extension, Json,
};

use afflink_scraper::{ScraperError, SearchEnvelope};

use crate::middleware::RequestId;

use super::body::{parse_body, parse_pairs, ScrapeParams};
use super::AppState;

/// `GET /scrape?product_name=...&min_price=...&max_price=...`
pub(super) async fn scrape_get(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    RawQuery(query): RawQuery,
) -> Json<SearchEnvelope> {
    let fields = query.as_deref().map(parse_pairs).unwrap_or_default();
    run(&state, &req_id, ScrapeParams::from_fields(&fields)).await
}

/// `POST /scrape` with a JSON, form-encoded or plain-text body.
pub(super) async fn scrape_post(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Json<SearchEnvelope> {
    run(&state, &req_id, ScrapeParams::from_fields(&parse_body(&body))).await
}

async fn run(state: &AppState, req_id: &RequestId, params: ScrapeParams) -> Json<SearchEnvelope> {
    let outcome = state
        .scout
        .search_text(&params.text, params.min_price, params.max_price)
        .await;
    match outcome {
        Ok(results) => {
            tracing::info!(request_id = %req_id.0, query = %params.text, results = results.len(), "scrape served");
            Json(SearchEnvelope::ok(results))
        }
        Err(e @ ScraperError::Validation(_)) => {
            tracing::info!(request_id = %req_id.0, query = %params.text, error = %e, "scrape request rejected");
            Json(SearchEnvelope::error(e.to_string()))
        }
        Err(e) => {
            tracing::error!(request_id = %req_id.0, query = %params.text, error = %e, "scrape failed");
            Json(SearchEnvelope::error(e.to_string()))
        }
    }
}
