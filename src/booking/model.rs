//! Purchase (booking) models and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::payment::Payment;
use crate::trip::Trip;

/// Booking status.
///
/// The happy path is linear: `AwaitingConfirmation -> Booked -> Dispatched -> Delivered`.
/// `Cancelled` and `Refunded` are sinks, reached only through cancellation.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "purchase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    AwaitingConfirmation,
    Booked,
    Dispatched,
    Delivered,
    Cancelled,
    Refunded,
}

/// Refusal to advance a booking that sits in a sink
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("booking is {0} and cannot advance")]
pub struct SinkStatus(pub PurchaseStatus);

impl PurchaseStatus {
    /// The next status on the happy path.
    ///
    /// `Delivered` maps to itself (nothing further to do). The sinks are refused.
    pub fn advance(self) -> Result<PurchaseStatus, SinkStatus> {
        match self {
            Self::AwaitingConfirmation => Ok(Self::Booked),
            Self::Booked => Ok(Self::Dispatched),
            Self::Dispatched => Ok(Self::Delivered),
            Self::Delivered => Ok(Self::Delivered),
            Self::Cancelled | Self::Refunded => Err(SinkStatus(self)),
        }
    }

    pub fn is_sink(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether the cancellation orchestrator acts on this status.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::AwaitingConfirmation | Self::Booked)
    }

    /// Human-readable label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::AwaitingConfirmation => "Awaiting Confirmation",
            Self::Booked => "Booked",
            Self::Dispatched => "Dispatched",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A client's booking of a trip
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Purchase {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub client_id: Uuid,
    pub status: PurchaseStatus,
    pub purchased_at: DateTime<Utc>,
    pub cargo_weight_kg: f64,
    pub distance_km: f64,
    pub freight_notes: Option<String>,
    pub pickup_instructions: Option<String>,
    pub delivery_instructions: Option<String>,
    /// Cost before commission and before the client's service fee.
    pub trip_total: i64,
    pub service_fee: i64,
    pub commission_amount: i64,
    pub transporter_amount: i64,
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for booking a trip
#[derive(Debug, Deserialize, Validate)]
pub struct BookTripRequest {
    #[validate(length(min = 3, max = 300))]
    pub pickup_address: String,
    #[validate(length(min = 3, max = 300))]
    pub delivery_address: String,
    #[validate(range(min = 0.1, max = 100000.0))]
    pub cargo_weight_kg: f64,
    #[validate(length(max = 2000))]
    pub freight_notes: Option<String>,
    #[validate(length(max = 1000))]
    pub pickup_instructions: Option<String>,
    #[validate(length(max = 1000))]
    pub delivery_instructions: Option<String>,
}

/// Who is booking
#[derive(Debug, Clone)]
pub struct BookingClient {
    pub id: Uuid,
    pub email: String,
}

/// Response DTO for a successful booking
#[derive(Debug, Serialize)]
pub struct BookingReceipt {
    pub purchase: Purchase,
    pub payment: Payment,
    pub authorization_url: String,
}

/// A booking with the records around it
#[derive(Debug, Serialize)]
pub struct BookingDetails {
    pub purchase: Purchase,
    pub trip: Trip,
    pub payment: Option<Payment>,
}

/// Request DTO for cancelling the booking on a trip
#[derive(Debug, Deserialize)]
pub struct CancelTripRequest {
    /// The status the caller was looking at when they pressed cancel.
    pub current_status: PurchaseStatus,
    #[serde(default)]
    pub confirmed: bool,
}

/// Request DTO for a transporter rejecting a booking
#[derive(Debug, Default, Deserialize)]
pub struct RejectBookingRequest {
    #[serde(default)]
    pub confirmed: bool,
}

/// Request DTO for rating a delivered trip
#[derive(Debug, Deserialize, Validate)]
pub struct RateTripRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}
