// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use common::*;
use trend_news_agent::api;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_app(agents: Vec<trend_news_agent::config::AgentConfig>, trends: std::sync::Arc<FakeTrends>) -> (Router, Harness) {
    let h = harness(
        agents,
        trends,
        FixedArticles::default(),
        EchoLlm { fail_articles_for: None },
    );
    (api::router(h.services.clone()), h)
}

async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn call_json(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Json) {
    let (status, bytes) = call(app, method, uri, body).await;
    let v: Json = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _h) = test_app(vec![], FakeTrends::new(TOPICS));
    let (status, bytes) = call(&app, "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "ok");
}

#[tokio::test]
async fn batch_run_fills_cache_session_and_history() {
    let (app, _h) = test_app(vec![agent("a", None), agent("b", None)], FakeTrends::new(TOPICS));

    let (_, cache) = call_json(&app, "GET", "/trends/cache", Body::empty()).await;
    assert_eq!(cache["state"], "empty");
    assert_eq!(cache["geo"], "AR");

    let (status, summary) = call_json(&app, "POST", "/batch/run", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["outcomes"][0]["status"], "published");
    assert_eq!(summary["outcomes"][0]["position"], 1);

    let (_, cache) = call_json(&app, "GET", "/trends/cache?geo=AR", Body::empty()).await;
    assert_eq!(cache["state"], "valid");
    assert_eq!(cache["topic_count"], 5);
    assert_eq!(cache["timeout_secs"], 20 * 60);

    let (_, session) = call_json(&app, "GET", "/session", Body::empty()).await;
    assert_eq!(session["positions"], serde_json::json!([1, 2]));

    let (_, history) = call_json(&app, "GET", "/debug/history?n=5", Body::empty()).await;
    assert_eq!(history.as_array().map(|a| a.len()), Some(1));
    assert_eq!(history[0]["succeeded"], 2);
}

#[tokio::test]
async fn clearing_cache_and_session_forces_a_fresh_start() {
    let (app, h) = test_app(vec![agent("a", None)], FakeTrends::new(TOPICS));

    call(&app, "POST", "/batch/run", Body::empty()).await;
    assert_eq!(h.trends.calls(), 1);

    let (status, _) = call_json(&app, "POST", "/trends/cache/clear", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, cache) = call_json(&app, "GET", "/trends/cache", Body::empty()).await;
    assert_eq!(cache["state"], "empty");

    call_json(&app, "POST", "/session/clear", Body::empty()).await;
    let (_, session) = call_json(&app, "GET", "/session", Body::empty()).await;
    assert_eq!(session["titles"], serde_json::json!([]));

    let (_, summary) = call_json(&app, "POST", "/batch/run", Body::empty()).await;
    assert_eq!(summary["outcomes"][0]["position"], 1);
    assert_eq!(h.trends.calls(), 2);
}

#[tokio::test]
async fn batch_run_accepts_options_and_rejects_garbage() {
    let (app, _h) = test_app(vec![agent("a", None), agent("b", None)], FakeTrends::new(TOPICS));

    let (status, summary) = call_json(
        &app,
        "POST",
        "/batch/run",
        Body::from(r#"{"agent_ids":["b"],"reset_session":true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 1);
    assert_eq!(summary["outcomes"][0]["agent_id"], "b");

    let (status, err) = call_json(&app, "POST", "/batch/run", Body::from("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["error"].as_str().unwrap().contains("invalid batch options"));
}

#[tokio::test]
async fn credentials_reset_returns_to_primary() {
    let trends = FakeTrends::new(TOPICS).failing_first(&["HTTP 401: Invalid API key"]);
    let (app, h) = test_app(vec![agent("a", None)], trends);

    call(&app, "POST", "/batch/run", Body::empty()).await;
    assert_eq!(h.services.provider.current_slot().as_str(), "backup");

    let (_, out) = call_json(&app, "POST", "/trends/credentials/reset", Body::empty()).await;
    assert_eq!(out["slot"], "primary");
    assert_eq!(out["has_backup"], true);
}
