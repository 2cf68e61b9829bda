#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;
use segments::config::Config;
use segments::database::repositories::{InMemoryRepository, Repository};
use segments::{AppState, build_router};

pub fn app_with_repo(repo: Arc<dyn Repository>) -> Router {
    let config = Config {
        ttl_sweep_interval_secs: 0,
        ..Config::default()
    };
    build_router(AppState::new(config, repo))
}

pub fn memory_app() -> Router {
    app_with_repo(Arc::new(InMemoryRepository::new()))
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json")
}

pub fn sorted_slugs(body: &serde_json::Value) -> Vec<String> {
    let mut slugs: Vec<String> = body["resp_data"]["segments"]
        .as_array()
        .expect("segments")
        .iter()
        .map(|slug| slug.as_str().expect("slug").to_string())
        .collect();
    slugs.sort();
    slugs
}
