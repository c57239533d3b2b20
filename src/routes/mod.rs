//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the rendering endpoints and the liveness probe under one Axum
//! router. CORS is wide open; the service holds no user data.

pub mod diagram;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub const HEALTHZ_BODY: &str = "ok";

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/generate-diagram", post(diagram::generate_diagram))
        .route("/render", post(diagram::render_form))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> &'static str {
    HEALTHZ_BODY
}
