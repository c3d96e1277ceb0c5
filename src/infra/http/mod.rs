mod middleware;
mod spa;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::pipeline::Pipeline;

pub use middleware::RequestId;

const PREVIEW_TOKEN_HEADER: &str = "x-spa-preview-token";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/spa", get(spa::get_data))
        .route("/api/spa/", get(spa::get_data))
        .route("/api/spa/notifications", post(spa::notify))
        .route("/_health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_id))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
