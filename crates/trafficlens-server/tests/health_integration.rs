use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use trafficlens_core::config::Config;
use trafficlens_duckdb::DuckDbBackend;
use trafficlens_server::app::build_app;
use trafficlens_server::state::AppState;

fn app() -> axum::Router {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    build_app(Arc::new(AppState::new(db, Config::default())))
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn health_reports_ok_without_identity() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let response = app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn dimensions_lists_catalog() {
    let request = Request::builder()
        .uri("/api/dimensions")
        .body(Body::empty())
        .expect("request");
    let response = app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let dimensions = body["dimensions"].as_array().expect("dimensions");
    assert_eq!(dimensions.len(), 12);
    let country = dimensions
        .iter()
        .find(|d| d["name"] == "country")
        .expect("country");
    assert_eq!(country["join"], "geo");
    assert_eq!(body["default"], "channel");
    assert_eq!(body["maxGroupBy"], 5);
    assert!(body["filterFields"]
        .as_array()
        .expect("filters")
        .iter()
        .any(|f| f == "page_action"));
}
