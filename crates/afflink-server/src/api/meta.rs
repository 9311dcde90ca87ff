use axum::{body::Bytes, http::HeaderMap, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use super::body::parse_body;

const SERVICE: &str = "afflink";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
pub(super) struct ServiceInfo {
    ok: bool,
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct VersionInfo {
    version: &'static str,
    ts: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct Echo {
    headers: Map<String, Value>,
    body: Map<String, Value>,
}

pub(super) async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        ok: true,
        service: SERVICE,
        version: VERSION,
    })
}

pub(super) async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: VERSION,
        ts: Utc::now().timestamp_millis(),
    })
}

/// Reflects the request headers and the leniently parsed body.
pub(super) async fn echo(headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    Json(Echo {
        headers,
        body: parse_body(&body),
    })
}
