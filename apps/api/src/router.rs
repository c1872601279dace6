use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{router::scheduling_routes, BookingService};
use learning_cell::{handlers::LearningState, router::learning_routes};

pub fn create_router(booking: Arc<BookingService>, learning: Arc<LearningState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler is running!" }))
        .nest("/scheduling", scheduling_routes(booking))
        .nest("/learning", learning_routes(learning))
}
