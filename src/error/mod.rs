//! Centralized API error handling for Freightlane
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::booking::{BookingError, CancellationNotice};
use crate::geocode::GeocodeError;
use crate::payment::GatewayError;
use crate::store::StoreError;
use crate::trip::{TripError, TripSummary};

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The truck is already scheduled in the requested window.
    #[error("Truck is already scheduled in this window")]
    TruckUnavailable(Vec<TripSummary>),

    #[error("Trip is not available: {0}")]
    TripUnavailable(String),

    #[error("Invalid state for cancellation: {0}")]
    InvalidState(String),

    #[error("Operation in progress: {0}")]
    OperationInFlight(String),

    #[error("Confirmation required: {}", .0.message)]
    ConfirmationRequired(Box<CancellationNotice>),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TruckUnavailable(_) => "TRUCK_UNAVAILABLE",
            ApiError::TripUnavailable(_) => "TRIP_UNAVAILABLE",
            ApiError::InvalidState(_) => "INVALID_STATE_FOR_CANCELLATION",
            ApiError::OperationInFlight(_) => "OPERATION_IN_FLIGHT",
            ApiError::ConfirmationRequired(_) => "CONFIRMATION_REQUIRED",
            ApiError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            ApiError::RefundFailed(_) => "REFUND_GATEWAY_FAILURE",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_)
            | ApiError::TruckUnavailable(_)
            | ApiError::TripUnavailable(_)
            | ApiError::InvalidState(_)
            | ApiError::OperationInFlight(_) => StatusCode::CONFLICT,
            ApiError::ConfirmationRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalServiceError(_) | ApiError::RefundFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Structured payload for errors the caller has to act on
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::TruckUnavailable(conflicts) => {
                Some(serde_json::json!({ "conflicts": conflicts }))
            }
            ApiError::ConfirmationRequired(notice) => serde_json::to_value(notice).ok(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        // Log server errors
        match &self {
            ApiError::InternalError(_)
            | ApiError::DatabaseError(_)
            | ApiError::ServiceUnavailable(_) => {
                tracing::error!(error = %message, code = %error_code, "Server error occurred");
            }
            ApiError::ExternalServiceError(_) | ApiError::RefundFailed(_) => {
                tracing::warn!(error = %message, code = %error_code, "Upstream error occurred");
            }
            _ => {
                tracing::debug!(error = %message, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                details: self.details(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => e.into(),
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::ExternalServiceError(err.to_string())
    }
}

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NoMatch(address) => {
                ApiError::UnprocessableEntity(format!("address could not be located: {}", address))
            }
            other => ApiError::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<TripError> for ApiError {
    fn from(err: TripError) -> Self {
        match err {
            TripError::InvalidSchedule(reason) => ApiError::ValidationError(reason),
            TripError::TruckUnavailable { conflicts } => ApiError::TruckUnavailable(conflicts),
            TripError::NotFound(id) => ApiError::NotFound(format!("trip {}", id)),
            e @ (TripError::Booked(_)
            | TripError::HasBookingHistory(_)
            | TripError::Expired(_)) => ApiError::Conflict(e.to_string()),
            e @ TripError::NotOwner => ApiError::Forbidden(e.to_string()),
            e @ TripError::PayoutAccountMissing => ApiError::UnprocessableEntity(e.to_string()),
            TripError::Validation(e) => e.into(),
            TripError::Store(e) => e.into(),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            e @ (BookingError::PurchaseNotFound(_) | BookingError::TripNotFound(_)) => {
                ApiError::NotFound(e.to_string())
            }
            BookingError::RecordNotFound(what) => ApiError::NotFound(what),
            BookingError::InvalidRequest(reason) => ApiError::ValidationError(reason),
            BookingError::Validation(e) => e.into(),
            BookingError::TripUnavailable(reason) => ApiError::TripUnavailable(reason),
            BookingError::Forbidden(reason) => ApiError::Forbidden(reason),
            BookingError::InvalidStateForCancellation(reason) => ApiError::InvalidState(reason),
            BookingError::RefundGatewayFailure(reason) => ApiError::RefundFailed(reason),
            e @ BookingError::SettlementFailed { .. } => ApiError::InternalError(e.to_string()),
            e @ BookingError::OperationInFlight(_) => ApiError::OperationInFlight(e.to_string()),
            e @ (BookingError::StatusConflict(_)
            | BookingError::Sink(_)
            | BookingError::NotRateable(_)) => ApiError::Conflict(e.to_string()),
            BookingError::ConfirmationRequired(notice) => ApiError::ConfirmationRequired(notice),
            BookingError::Gateway(e) => e.into(),
            BookingError::Geocode(e) => e.into(),
            BookingError::Store(e) => e.into(),
        }
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
