//! Operator endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::geocode::{CachedGeocoder, GeocodeStats};
use crate::middleware::AdminUser;
use crate::models::ApiResponse;

#[derive(Debug, Serialize)]
pub struct CacheCleared {
    pub cleared: usize,
}

pub async fn geocode_cache_stats(
    State(geocoder): State<Arc<CachedGeocoder>>,
    _admin: AdminUser,
) -> Json<ApiResponse<GeocodeStats>> {
    Json(ApiResponse {
        success: true,
        data: Some(geocoder.stats().await),
        error: None,
    })
}

pub async fn clear_geocode_cache(
    State(geocoder): State<Arc<CachedGeocoder>>,
    AdminUser(admin): AdminUser,
) -> Json<ApiResponse<CacheCleared>> {
    let cleared = geocoder.clear().await;
    tracing::info!(admin_id = %admin.user_id, cleared, "Geocode cache cleared");

    Json(ApiResponse {
        success: true,
        data: Some(CacheCleared { cleared }),
        error: None,
    })
}
