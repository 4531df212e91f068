//! Trip API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{AuthenticatedUser, TransporterUser};
use crate::models::ApiResponse;
use crate::trip::{
    Availability, AvailabilityQuery, CreateTripRequest, RescheduleTripRequest, Trip,
    TripLookupQuery, TripSearchQuery, TripService,
};

pub async fn create_trip(
    State(service): State<Arc<TripService>>,
    TransporterUser(user): TransporterUser,
    Json(request): Json<CreateTripRequest>,
) -> Result<Json<ApiResponse<Trip>>, ApiError> {
    let trip = service.create_trip(user.user_id, request).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trip),
        error: None,
    }))
}

/// Bookable trips, filtered by route and departure window
pub async fn search_trips(
    State(service): State<Arc<TripService>>,
    Query(query): Query<TripSearchQuery>,
) -> Result<Json<ApiResponse<Vec<Trip>>>, ApiError> {
    let trips = service.search(&query).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trips),
        error: None,
    }))
}

pub async fn my_trips(
    State(service): State<Arc<TripService>>,
    TransporterUser(user): TransporterUser,
) -> Result<Json<ApiResponse<Vec<Trip>>>, ApiError> {
    let trips = service.trips_for_transporter(user.user_id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trips),
        error: None,
    }))
}

pub async fn lookup_trips(
    State(service): State<Arc<TripService>>,
    _user: AuthenticatedUser,
    Query(query): Query<TripLookupQuery>,
) -> Result<Json<ApiResponse<Vec<Trip>>>, ApiError> {
    let ids = query
        .parse_ids()
        .map_err(|e| ApiError::BadRequest(format!("invalid trip id: {}", e)))?;
    let trips = service.lookup(&ids).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trips),
        error: None,
    }))
}

pub async fn get_trip(
    State(service): State<Arc<TripService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trip>>, ApiError> {
    let trip = service.get_trip(id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trip),
        error: None,
    }))
}

pub async fn reschedule_trip(
    State(service): State<Arc<TripService>>,
    TransporterUser(user): TransporterUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleTripRequest>,
) -> Result<Json<ApiResponse<Trip>>, ApiError> {
    let trip = service.reschedule(user.user_id, id, request).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trip),
        error: None,
    }))
}

pub async fn delete_trip(
    State(service): State<Arc<TripService>>,
    TransporterUser(user): TransporterUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Uuid>>, ApiError> {
    service.delete_trip(user.user_id, id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(id),
        error: None,
    }))
}

pub async fn relist_trip(
    State(service): State<Arc<TripService>>,
    TransporterUser(user): TransporterUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trip>>, ApiError> {
    let trip = service.relist(user.user_id, id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(trip),
        error: None,
    }))
}

/// Whether a truck is free in a window, with the trips in the way
pub async fn truck_availability(
    State(service): State<Arc<TripService>>,
    _user: AuthenticatedUser,
    Path(truck_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Availability>>, ApiError> {
    let availability = service
        .is_available(truck_id, query.departure, query.arrival, query.exclude_trip_id)
        .await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(availability),
        error: None,
    }))
}
