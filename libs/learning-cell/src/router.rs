// libs/learning-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{self, LearningState};

pub fn learning_routes(state: Arc<LearningState>) -> Router {
    Router::new()
        .route("/predict", get(handlers::predict_success))
        .route("/outcomes", post(handlers::record_outcome))
        .route("/priority/rank", post(handlers::rank_requests))
        .with_state(state)
}
