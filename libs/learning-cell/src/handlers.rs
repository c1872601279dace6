// libs/learning-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Local;
use serde_json::{json, Value};
use tracing::info;

use shared_models::error::AppError;

use crate::models::{OutcomeReport, PendingRequest, PredictionQuery};
use crate::services::{OutcomeLearner, OutcomeTracker, PriorityScorer};

/// Shared state behind the learning routes.
pub struct LearningState {
    pub learner: Arc<OutcomeLearner>,
    pub scorer: PriorityScorer,
}

impl LearningState {
    pub fn new(learner: Arc<OutcomeLearner>) -> Self {
        Self {
            learner,
            scorer: PriorityScorer::default(),
        }
    }
}

#[axum::debug_handler]
pub async fn predict_success(
    State(state): State<Arc<LearningState>>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<Value>, AppError> {
    let probability = state
        .learner
        .predict_success_probability(query.moment, query.urgency);

    Ok(Json(json!({
        "moment": query.moment,
        "urgency": query.urgency,
        "success_probability": probability,
        "trained": state.learner.is_trained(),
        "model_family": state.learner.model_family(),
    })))
}

#[axum::debug_handler]
pub async fn record_outcome(
    State(state): State<Arc<LearningState>>,
    Json(report): Json<OutcomeReport>,
) -> Result<Json<Value>, AppError> {
    state
        .learner
        .learn(report.moment, report.urgency, report.success)
        .await;

    let examples = state.learner.example_count().await;
    info!("Recorded booking outcome, corpus now has {} examples", examples);

    Ok(Json(json!({
        "recorded": true,
        "training_examples": examples,
    })))
}

#[axum::debug_handler]
pub async fn rank_requests(
    State(state): State<Arc<LearningState>>,
    Json(requests): Json<Vec<PendingRequest>>,
) -> Result<Json<Vec<PendingRequest>>, AppError> {
    let now = Local::now().naive_local();
    Ok(Json(state.scorer.rank(requests, now)))
}
