//! Trip domain module
//!
//! Trips, truck availability, and the periodic expiry sweep.

mod availability;
mod model;
mod service;
mod sweep;

pub use availability::{find_conflicts, windows_overlap, Availability};
pub use model::*;
pub use service::TripService;
pub use sweep::start_expiry_sweep;

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Trip errors
#[derive(Error, Debug)]
pub enum TripError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("truck is already scheduled in this window")]
    TruckUnavailable { conflicts: Vec<TripSummary> },

    #[error("trip {0} not found")]
    NotFound(Uuid),

    #[error("trip {0} is booked")]
    Booked(Uuid),

    #[error("trip {0} has settled bookings and cannot be deleted")]
    HasBookingHistory(Uuid),

    #[error("trip {0} has expired")]
    Expired(Uuid),

    #[error("trip belongs to another transporter")]
    NotOwner,

    #[error("a payout account is required before offering trips")]
    PayoutAccountMissing,

    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reject windows whose arrival is not strictly after departure.
pub fn validate_schedule(
    departure_at: chrono::DateTime<chrono::Utc>,
    arrival_at: chrono::DateTime<chrono::Utc>,
) -> Result<(), TripError> {
    if arrival_at <= departure_at {
        return Err(TripError::InvalidSchedule(
            "arrival must be after departure".to_string(),
        ));
    }
    Ok(())
}
