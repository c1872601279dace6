// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::services::booking::BookingService;

pub fn scheduling_routes(service: Arc<BookingService>) -> Router {
    Router::new()
        // Slot table
        .route("/slots/{day}", get(handlers::get_slots))
        .route("/slots/{day}/populate", post(handlers::populate_slots))
        .route("/slots/{day}/book", post(handlers::book_slot))
        .route("/slots/{day}/nearby", get(handlers::nearby_slots))
        .route("/bookings", get(handlers::list_bookings))

        // Appointment ledger
        .route("/appointments", post(handlers::schedule_appointment))
        .route("/appointments/batch", post(handlers::schedule_batch))
        .route("/appointments/next-available", get(handlers::next_available))
        .route("/appointments/day/{day}", get(handlers::appointments_for_day))
        .route("/appointments/day/{day}/available", get(handlers::available_moments))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/complete", post(handlers::complete_appointment))
        .with_state(service)
}
