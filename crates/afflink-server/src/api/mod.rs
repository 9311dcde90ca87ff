mod body;
mod meta;
mod scrape;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use afflink_scraper::Scout;

use crate::middleware::request_id;

#[derive(Clone)]
pub struct AppState {
    pub scout: Arc<Scout>,
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(meta::root))
        .route("/version", get(meta::version))
        .route("/echo", post(meta::echo))
        .route(
            "/scrape",
            get(scrape::scrape_get).post(scrape::scrape_post),
        )
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
