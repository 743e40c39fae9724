//! End-to-end router tests: auth, status codes, and the JSON envelope.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use upwatch_api::build_router;
use upwatch_core::ProbeOutcome;
use upwatch_core::ServiceDefinition;
use upwatch_core::config::SchedulerConfig;
use upwatch_probe::{BoxFuture, Prober};
use upwatch_scheduler::Monitor;
use upwatch_state::StateStore;

const TOKEN: &str = "test-admin-token";

/// Never completes, so every service stays `unknown`.
struct PendingProber;

impl Prober for PendingProber {
    fn probe<'a>(&'a self, _definition: &'a ServiceDefinition) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(std::future::pending::<ProbeOutcome>())
    }
}

fn test_router(admin_token: Option<&str>) -> Router {
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let monitor = Monitor::new(store, Arc::new(PendingProber), &SchedulerConfig::default());
    build_router(Arc::new(monitor), admin_token.map(str::to_string))
}

fn service_body() -> Value {
    json!({
        "name": "website",
        "ping_service_name": "http_head",
        "url": "https://example.com/",
        "timeout": "5s",
        "interval": "60s",
        "failure_interval": "30s",
        "warning_threshold": "2s"
    })
}

fn post_json(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn admin(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_open() {
    let router = test_router(None);
    let resp = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_services_empty() {
    let router = test_router(Some(TOKEN));
    let resp = router.oneshot(get("/api/v1/services")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn create_requires_bearer_token() {
    let router = test_router(Some(TOKEN));

    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &service_body(), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["success"], false);

    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &service_body(), Some("wrong")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = router.oneshot(get("/api/v1/services")).await.unwrap();
    assert_eq!(json_body(resp).await["data"], json!([]));
}

#[tokio::test]
async fn admin_routes_disabled_without_token() {
    let router = test_router(None);
    let resp = router
        .oneshot(post_json("/api/v1/services", &service_body(), Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_get_delete_roundtrip() {
    let router = test_router(Some(TOKEN));

    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &service_body(), Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["state"], "unknown");
    assert_eq!(body["data"]["ping_service_name"], "http_head");
    assert_eq!(body["data"]["failure_threshold"], 3);

    let resp = router
        .clone()
        .oneshot(get(&format!("/api/v1/services/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["name"], "website");

    let resp = router
        .clone()
        .oneshot(get(&format!("/api/v1/services/{id}/outcomes?limit=10")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"], json!([]));

    // Delete is admin-only.
    let resp = router
        .clone()
        .oneshot(
            Request::delete(format!("/api/v1/services/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = router
        .clone()
        .oneshot(admin("DELETE", &format!("/api/v1/services/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .oneshot(get(&format!("/api/v1/services/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["code"], "not_found");
}

#[tokio::test]
async fn validation_errors_carry_codes() {
    let router = test_router(Some(TOKEN));

    let mut missing = service_body();
    missing.as_object_mut().unwrap().remove("interval");
    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &missing, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "missing_field");

    let tcp = json!({
        "name": "db",
        "ping_service_name": "tcp",
        "host": "db.internal",
        "port": 70000,
        "timeout": "1s",
        "interval": "10s",
        "failure_interval": "5s",
        "warning_threshold": "500ms"
    });
    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &tcp, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "out_of_range");

    let resp = router
        .oneshot(
            Request::post("/api/v1/services")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "invalid_json");
}

#[tokio::test]
async fn reset_and_check_unknown_service() {
    let router = test_router(Some(TOKEN));

    let resp = router
        .clone()
        .oneshot(admin("POST", "/api/v1/services/svc-404/reset"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = router
        .clone()
        .oneshot(admin("POST", "/api/v1/services/svc-404/check"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = router
        .oneshot(get("/api/v1/services/svc-404/incidents"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reset_and_check_existing_service() {
    let router = test_router(Some(TOKEN));
    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &service_body(), Some(TOKEN)))
        .await
        .unwrap();
    let id = json_body(resp).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = router
        .clone()
        .oneshot(admin("POST", &format!("/api/v1/services/{id}/reset")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = router
        .clone()
        .oneshot(admin("POST", &format!("/api/v1/services/{id}/check")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let resp = router
        .oneshot(get(&format!("/api/v1/services/{id}/incidents")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"], json!([]));
}

#[tokio::test]
async fn oversized_intervals_are_rejected() {
    let router = test_router(Some(TOKEN));

    let mut huge = service_body();
    huge["interval"] = json!(u64::MAX);
    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &huge, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "out_of_range");

    let mut overflow = service_body();
    overflow["interval"] = json!("999999999999999999h");
    let resp = router
        .clone()
        .oneshot(post_json("/api/v1/services", &overflow, Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "invalid_value");

    let resp = router.oneshot(get("/api/v1/services")).await.unwrap();
    assert_eq!(json_body(resp).await["data"], json!([]));
}
