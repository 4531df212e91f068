//! Route definitions for the Freightlane API

mod admin;
mod booking;
mod notification;
mod payment;
mod trip;

pub use admin::admin_routes;
pub use booking::booking_routes;
pub use notification::notification_routes;
pub use payment::payment_routes;
pub use trip::trip_routes;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Every route, bound to `state`. Middleware is layered on by the caller.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .merge(trip_routes())
        .merge(booking_routes())
        .merge(payment_routes())
        .merge(notification_routes())
        .merge(admin_routes())
        .with_state(state)
}

async fn root() -> &'static str {
    "Freightlane API Server"
}
