//! Axum router wiring for the admin surface.
//!
//! `/healthz` and `/metrics` are open; everything under `/v1` passes the
//! admin token gate.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/v1/limits/:kind", get(ops::get_limit).put(ops::put_limit))
        .route("/v1/enabled/:kind", put(ops::put_enabled))
        .route("/v1/realms/:realm/limits", get(ops::realm_limits))
        .route("/v1/admission/check", post(ops::check_admission))
        .route("/v1/stats/global", get(ops::global_stats))
        .route("/v1/stats/actors", get(ops::actors))
        .route("/v1/stats/actors/:actor", get(ops::actor_stats))
        .route("/v1/stats/actors/:actor/events", get(ops::actor_events))
        .route("/v1/stats/regions/:realm/top", get(ops::top_regions))
        .route("/v1/stats/regions/:realm/:x/:z/events", get(ops::region_events))
        .route("/v1/stats/regions/:realm/:x/:z/grid", get(ops::region_grid))
        .route("/v1/admin/reload", post(ops::reload))
        .route("/v1/admin/reset", post(ops::reset))
        .route_layer(middleware::from_fn_with_state(state.clone(), ops::require_token));

    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .merge(v1)
        .with_state(state)
}
