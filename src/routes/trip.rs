//! Trip route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn trip_routes() -> Router<AppState> {
    Router::new()
        .route("/api/trips", post(create_trip).get(search_trips))
        .route("/api/trips/mine", get(my_trips))
        .route("/api/trips/lookup", get(lookup_trips))
        .route("/api/trips/:id", get(get_trip).delete(delete_trip))
        .route("/api/trips/:id/schedule", put(reschedule_trip))
        .route("/api/trips/:id/relist", post(relist_trip))
        .route(
            "/api/trucks/:truck_id/availability",
            get(truck_availability),
        )
}
