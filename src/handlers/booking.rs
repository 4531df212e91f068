//! Booking API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::{
    AdvanceOutcome, BookTripRequest, BookingDetails, BookingReceipt, BookingService,
    CancelTripRequest, CancellationNotice, CancellationOutcome, Purchase, RateTripRequest,
    RejectBookingRequest, RejectionOutcome,
};
use crate::error::ApiError;
use crate::middleware::{AuthenticatedUser, ClientUser, TransporterUser};
use crate::models::ApiResponse;

pub async fn book_trip(
    State(service): State<Arc<BookingService>>,
    client: ClientUser,
    Path(trip_id): Path<Uuid>,
    Json(request): Json<BookTripRequest>,
) -> Result<Json<ApiResponse<BookingReceipt>>, ApiError> {
    let receipt = service
        .book_trip(trip_id, client.as_booking_client(), request)
        .await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(receipt),
        error: None,
    }))
}

pub async fn cancellation_notice(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancellationNotice>>, ApiError> {
    let notice = service.cancellation_notice(trip_id, user.user_id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(notice),
        error: None,
    }))
}

/// Cancel the active booking on a trip. Without `confirmed` the response is
/// a 428 carrying the notice to show the user.
pub async fn cancel_trip(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    Path(trip_id): Path<Uuid>,
    Json(request): Json<CancelTripRequest>,
) -> Result<Json<ApiResponse<CancellationOutcome>>, ApiError> {
    let outcome = service
        .cancel(trip_id, request.current_status, user.user_id, request.confirmed)
        .await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(outcome),
        error: None,
    }))
}

pub async fn list_bookings(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<Purchase>>>, ApiError> {
    let purchases = service.list_bookings(&user.identity()).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(purchases),
        error: None,
    }))
}

pub async fn get_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingDetails>>, ApiError> {
    let details = service.get_booking(purchase_id, &user.identity()).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(details),
        error: None,
    }))
}

pub async fn advance_booking(
    State(service): State<Arc<BookingService>>,
    TransporterUser(user): TransporterUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<ApiResponse<AdvanceOutcome>>, ApiError> {
    let outcome = service.advance_status(purchase_id, user.user_id).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(outcome),
        error: None,
    }))
}

pub async fn reject_booking(
    State(service): State<Arc<BookingService>>,
    TransporterUser(user): TransporterUser,
    Path(purchase_id): Path<Uuid>,
    Json(request): Json<RejectBookingRequest>,
) -> Result<Json<ApiResponse<RejectionOutcome>>, ApiError> {
    let outcome = service
        .reject(purchase_id, user.user_id, request.confirmed)
        .await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(outcome),
        error: None,
    }))
}

pub async fn rate_booking(
    State(service): State<Arc<BookingService>>,
    ClientUser(user): ClientUser,
    Path(purchase_id): Path<Uuid>,
    Json(request): Json<RateTripRequest>,
) -> Result<Json<ApiResponse<Purchase>>, ApiError> {
    let purchase = service.rate_trip(purchase_id, user.user_id, request).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(purchase),
        error: None,
    }))
}
