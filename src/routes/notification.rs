//! Notification inbox routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{list_notifications, mark_notification_read};
use crate::state::AppState;

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", post(mark_notification_read))
}
