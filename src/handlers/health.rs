//! Liveness and database health

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db::DbHealth;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<DbHealth>,
}

pub async fn health_check(State(app_state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &app_state.database {
        Some(db) => Some(db.health().await),
        None => None,
    };
    let healthy = database.as_ref().map_or(true, |db| db.healthy);

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}
