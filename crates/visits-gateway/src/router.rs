//! Axum router wiring.
//!
//! The counter route (default `POST /visits`) plus the ops endpoints. Other
//! methods on the counter route get 405 from the router; unknown paths 404.
//! With `server.cors_allow_origin` set, a CORS layer wraps every route,
//! including router-generated errors, and answers preflight requests.

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let route = state.cfg().server.route.clone();
    let cors = state.cors_allow_origin().map(cors_layer);

    let router = Router::new()
        .route(&route, post(transport::visits::record_visit))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state);

    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

fn cors_layer(origin: &HeaderValue) -> CorsLayer {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(origin.clone())
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
