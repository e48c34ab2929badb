use crate::model::ModelBundle;
use crate::sink::ResultSink;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

/// Everything a request needs: shared mutable state, the immutable model
/// bundle and the result sink.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub state: Arc<RwLock<AppState>>,
    pub bundle: Arc<ModelBundle>,
    pub sink: Arc<dyn ResultSink>,
}

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/infer", post(handlers::post_infer))
        .route("/api/latest", get(handlers::get_latest))
        .route("/api/health", get(handlers::get_health))
        .with_state(context)
}
