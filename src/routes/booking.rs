//! Booking route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trips/:id/bookings", post(book_trip))
        .route(
            "/api/trips/:id/cancellation-notice",
            get(cancellation_notice),
        )
        .route("/api/trips/:id/cancel", post(cancel_trip))
        .route("/api/bookings", get(list_bookings))
        .route("/api/bookings/:id", get(get_booking))
        .route("/api/bookings/:id/advance", post(advance_booking))
        .route("/api/bookings/:id/reject", post(reject_booking))
        .route("/api/bookings/:id/rating", post(rate_booking))
}
