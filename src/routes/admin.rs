//! Admin route definitions

use axum::{routing::get, Router};

use crate::handlers::{clear_geocode_cache, geocode_cache_stats};
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new().route(
        "/api/admin/geocode-cache",
        get(geocode_cache_stats).delete(clear_geocode_cache),
    )
}
