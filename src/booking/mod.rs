//! Booking domain module
//!
//! Booking creation, the status transition engine and the cancellation /
//! refund orchestrator. Every operation that can move money or delete a
//! booking for a given purchase runs under a single-flight guard.

mod cancellation;
mod guard;
mod model;
mod pricing;
mod reconcile;
mod service;
mod status;

pub use cancellation::{
    plan_cancellation, Actor, CancellationNotice, CancellationOutcome, CancellationPlan,
    PaymentDisposition, RejectionOutcome,
};
pub use guard::{InFlight, InFlightPermit};
pub use model::*;
pub use pricing::{format_rands, PriceBreakdown, PricingPolicy};
pub use service::{BookingService, BookingSettings};
pub use status::{AdvanceOutcome, CaptureOutcome};

use thiserror::Error;
use uuid::Uuid;

use crate::geocode::GeocodeError;
use crate::payment::GatewayError;
use crate::store::StoreError;

/// Booking errors
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("booking {0} not found")]
    PurchaseNotFound(Uuid),

    #[error("trip {0} not found")]
    TripNotFound(Uuid),

    #[error("{0}")]
    RecordNotFound(String),

    #[error("invalid booking request: {0}")]
    InvalidRequest(String),

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Booked, expired, unlisted or departed.
    #[error("trip is not available: {0}")]
    TripUnavailable(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("invalid state for cancellation: {0}")]
    InvalidStateForCancellation(String),

    #[error("refund failed: {0}")]
    RefundGatewayFailure(String),

    /// The gateway moved money but the local records could not be updated.
    #[error("refund {reference} went through but could not be recorded: {reason}")]
    SettlementFailed { reference: String, reason: String },

    #[error("another operation on booking {0} is in progress")]
    OperationInFlight(Uuid),

    #[error("booking {0} changed while it was being updated")]
    StatusConflict(Uuid),

    #[error("confirmation required")]
    ConfirmationRequired(Box<CancellationNotice>),

    #[error(transparent)]
    Sink(#[from] SinkStatus),

    #[error("booking {0} can only be rated once delivered")]
    NotRateable(Uuid),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
