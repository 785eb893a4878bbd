//! Administrative HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/metrics` : Prometheus text format
//! - `/v1/...`  : limits, statistics, reload, reset (token-gated when configured)

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use regioncap_core::error::{ErrorCode, QuotaError};
use regioncap_core::{Decision, ObjectKind, RegionKey};

use crate::app_state::AppState;
use crate::policy::{LimitSource, RealmLimitsView, ResolvedLimit};
use crate::stats::{Hotspot, OccupancyGrid};
use crate::store::{ActorCounters, GlobalStatistics};

pub const TOKEN_HEADER: &str = "x-admin-token";

const DEFAULT_TOP: usize = 10;
const DEFAULT_HISTORY: usize = 50;
const DEFAULT_ACTORS: usize = 100;
const DEFAULT_GRID_RADIUS: u32 = 3;

/// Error body: `{ "code": "...", "message": "..." }`.
pub enum ApiError {
    Unauthorized,
    Quota(QuotaError),
}

impl From<QuotaError> for ApiError {
    fn from(e: QuotaError) -> Self {
        ApiError::Quota(e)
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidKind | ErrorCode::InvalidLimit | ErrorCode::BadConfig => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PolicyUnavailable | ErrorCode::StorageUnavailable | ErrorCode::RegionBusy => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "code": "UNAUTHORIZED", "message": "missing or invalid admin token" })),
            )
                .into_response(),
            ApiError::Quota(e) => {
                let code = e.code();
                (
                    status_for(code),
                    Json(json!({ "code": code.as_str(), "message": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run store-backed work on the blocking pool; SQLite calls wait on a
/// connection lock and must not park a runtime worker.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> regioncap_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| QuotaError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Token gate for `/v1` routes. A no-op when `admin.token` is unset.
pub async fn require_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(e) = authorize(&state, req.headers()) {
        return e.into_response();
    }
    next.run(req).await
}

pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin().token.as_deref() else {
        return Ok(());
    };
    match headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(given) if given == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RealmQuery {
    pub realm: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LimitView {
    pub kind: ObjectKind,
    pub realm: Option<String>,
    pub limit: u32,
    pub enabled: bool,
    pub source: LimitSource,
}

impl LimitView {
    fn new(kind: ObjectKind, realm: Option<String>, r: ResolvedLimit) -> Self {
        Self {
            kind,
            realm,
            limit: r.limit,
            enabled: r.enabled,
            source: r.source,
        }
    }
}

pub async fn get_limit(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(q): Query<RealmQuery>,
) -> ApiResult<LimitView> {
    let kind: ObjectKind = kind.parse()?;
    let resolved = match q.realm.as_deref() {
        Some(realm) => state.policy().resolve(realm, kind),
        None => state.policy().resolve_default(kind),
    };
    Ok(Json(LimitView::new(kind, q.realm, resolved)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLimitReq {
    pub value: i64,
    #[serde(default)]
    pub realm: Option<String>,
}

pub async fn put_limit(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<SetLimitReq>,
) -> ApiResult<LimitView> {
    let resolved = state.set_limit(&kind, req.value, req.realm.as_deref())?;
    let kind: ObjectKind = kind.parse()?;
    Ok(Json(LimitView::new(kind, req.realm, resolved)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetEnabledReq {
    pub enabled: bool,
}

pub async fn put_enabled(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<SetEnabledReq>,
) -> ApiResult<LimitView> {
    let resolved = state.set_enabled(&kind, req.enabled)?;
    let kind: ObjectKind = kind.parse()?;
    Ok(Json(LimitView::new(kind, None, resolved)))
}

pub async fn realm_limits(
    State(state): State<AppState>,
    Path(realm): Path<String>,
) -> ApiResult<RealmLimitsView> {
    Ok(Json(state.policy().realm_limits(&realm)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckReq {
    pub realm: String,
    pub x: i32,
    pub z: i32,
    pub kind: String,
    /// Pre-placement count reported by the caller.
    pub occupancy: u32,
}

/// Dry-run: apply the quota rule to a reported count. Records nothing.
pub async fn check_admission(
    State(state): State<AppState>,
    Json(req): Json<CheckReq>,
) -> ApiResult<Decision> {
    let kind: ObjectKind = req.kind.parse()?;
    let region = RegionKey::new(req.realm, req.x, req.z);
    Ok(Json(state.engine().check_reported(&region, kind, req.occupancy)))
}

pub async fn global_stats(State(state): State<AppState>) -> ApiResult<GlobalStatistics> {
    blocking(&state, |s| s.stats().global()).await.map(Json)
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub async fn actors(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<ActorCounters>> {
    let limit = q.limit.unwrap_or(DEFAULT_ACTORS);
    blocking(&state, move |s| s.stats().actors(limit)).await.map(Json)
}

pub async fn actor_stats(
    State(state): State<AppState>,
    Path(actor): Path<String>,
) -> ApiResult<ActorCounters> {
    blocking(&state, move |s| {
        s.stats()
            .actor(&actor)?
            .ok_or_else(|| QuotaError::NotFound(format!("no statistics for actor {actor}")))
    })
    .await
    .map(Json)
}

pub async fn actor_events(
    State(state): State<AppState>,
    Path(actor): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<regioncap_core::PlacementEvent>> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY);
    blocking(&state, move |s| s.stats().actor_history(&actor, limit))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
    pub kind: Option<String>,
}

pub async fn top_regions(
    State(state): State<AppState>,
    Path(realm): Path<String>,
    Query(q): Query<TopQuery>,
) -> ApiResult<Vec<Hotspot>> {
    let kind = q.kind.as_deref().map(str::parse::<ObjectKind>).transpose()?;
    let limit = q.limit.unwrap_or(DEFAULT_TOP);
    blocking(&state, move |s| s.stats().hotspots(&realm, kind, limit))
        .await
        .map(Json)
}

pub async fn region_events(
    State(state): State<AppState>,
    Path((realm, x, z)): Path<(String, i32, i32)>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<regioncap_core::PlacementEvent>> {
    let region = RegionKey::new(realm, x, z);
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY);
    blocking(&state, move |s| s.stats().region_history(&region, limit))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub radius: Option<u32>,
    pub kind: Option<String>,
}

pub async fn region_grid(
    State(state): State<AppState>,
    Path((realm, x, z)): Path<(String, i32, i32)>,
    Query(q): Query<GridQuery>,
) -> ApiResult<OccupancyGrid> {
    let kind = q.kind.as_deref().map(str::parse::<ObjectKind>).transpose()?;
    let center = RegionKey::new(realm, x, z);
    let radius = q.radius.unwrap_or(DEFAULT_GRID_RADIUS);
    blocking(&state, move |s| s.stats().occupancy_grid(&center, radius, kind))
        .await
        .map(Json)
}

pub async fn reload(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    blocking(&state, |s| s.reload()).await?;
    Ok(Json(json!({ "reloaded": true })))
}

pub async fn reset(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    blocking(&state, |s| s.reset()).await?;
    Ok(Json(json!({ "reset": true })))
}
