#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use regioncap_core::{ObjectKind, RegionKey};
use regioncap_engine::admission::{OccupancySource, TrackedOccupancy};
use regioncap_engine::app_state::AppState;
use regioncap_engine::config::{self, StaticSource};
use regioncap_engine::ops::TOKEN_HEADER;
use regioncap_engine::router::build_router;

const YAML: &str = r#"
version: 1
limits: { hopper: 6 }
admin:
  token: "s3cret"
"#;

fn state() -> AppState {
    let store = common::memory_store();
    let occupancy: Arc<dyn OccupancySource> = Arc::new(TrackedOccupancy::new(Arc::clone(&store)));
    AppState::new(
        config::load_from_str(YAML).unwrap(),
        Arc::new(StaticSource::new(YAML)),
        store,
        occupancy,
    )
}

async fn get(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header(TOKEN_HEADER, token);
    }
    let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn liveness_is_open() {
    let (status, _) = get(build_router(state()), "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(build_router(state()), "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn v1_requires_the_admin_token() {
    let app = build_router(state());

    let (status, body) = get(app.clone(), "/v1/stats/global", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = get(app.clone(), "/v1/stats/global", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(app, "/v1/stats/global", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_events"], 0);
}

#[tokio::test]
async fn region_routes_accept_negative_coordinates() {
    let state = state();
    let region = RegionKey::new("world", -3, -7);
    match state.engine().admit(&region, ObjectKind::Hopper, "alice").await.unwrap() {
        regioncap_engine::admission::Ticket::Admit(p) => {
            p.commit().await;
        }
        other => panic!("expected admit, got {:?}", other.decision()),
    }
    let app = build_router(state);

    let (status, body) = get(app.clone(), "/v1/stats/regions/world/-3/-7/events", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["actor"], "alice");

    let (status, _) = get(app.clone(), "/v1/stats/regions/world/-3/-7/grid?radius=1", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app, "/v1/stats/actors?limit=5", Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["actor"], "alice");
}

#[tokio::test]
async fn unknown_actor_is_not_found() {
    let (status, body) = get(build_router(state()), "/v1/stats/actors/nobody", Some("s3cret")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
