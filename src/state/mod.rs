//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::JwtVerifier;
use crate::booking::BookingService;
use crate::db::Database;
use crate::geocode::CachedGeocoder;
use crate::store::NotificationQueue;
use crate::trip::TripService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub trip_service: Arc<TripService>,
    pub booking_service: Arc<BookingService>,
    pub inbox: Arc<dyn NotificationQueue>,
    pub geocoder: Arc<CachedGeocoder>,
    pub ws_state: WsState,
    pub jwt: JwtVerifier,
    pub webhook_secret: Option<String>,
    /// Absent when running against the in-memory store.
    pub database: Option<Database>,
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt.clone()
    }
}

impl FromRef<AppState> for Arc<TripService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.trip_service.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn NotificationQueue> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.inbox.clone()
    }
}

impl FromRef<AppState> for Arc<CachedGeocoder> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.geocoder.clone()
    }
}
