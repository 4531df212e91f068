//! Record store ports
//!
//! The engine talks to persistence only through these traits. [`PgStore`] is
//! the production implementation; [`InMemoryStore`] backs the test-suite.
//!
//! Single-record writes that race with another actor are compare-and-set:
//! they name the state they expect and report whether it still held. The
//! composite operations on [`BookingStore`] are applied all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::booking::{Purchase, PurchaseStatus};
use crate::notification::{InboxQuery, NewNotification, Notification};
use crate::payment::{Payment, PaymentStatus};
use crate::trip::{Trip, TripSearchQuery, TripSummary};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    /// A conditional write found the record in a different state.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// What happens to the payment when a booking is thrown away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDisposal {
    /// No payment record exists.
    None,
    Delete(Uuid),
    /// Keep the record for audit, moved to `status`.
    Retain {
        id: Uuid,
        status: PaymentStatus,
        refunded_amount: Option<i64>,
    },
}

/// Result of a write that must keep one truck's trip windows disjoint
#[derive(Debug, Clone, PartialEq)]
pub enum WindowClaim {
    Claimed,
    /// The window collides with these trips; nothing was written.
    Conflicts(Vec<TripSummary>),
}

/// Everything written when a client books a trip
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub trip_id: Uuid,
    pub origin_address: String,
    pub destination_address: String,
    pub purchase: Purchase,
    pub payment: Payment,
}

/// Everything written after a refund for a charged booking went through
#[derive(Debug, Clone, Copy)]
pub struct RefundSettlement {
    pub trip_id: Uuid,
    pub purchase_id: Uuid,
    pub expected_status: PurchaseStatus,
    pub new_status: PurchaseStatus,
    pub payment_id: Uuid,
    pub refunded_amount: i64,
    pub settled_at: DateTime<Utc>,
}

#[async_trait]
pub trait TripStore: Send + Sync {
    /// Insert a trip unless its window overlaps another active trip on the
    /// same truck. The check and the insert are serialized per truck.
    async fn insert_trip(&self, trip: &Trip) -> Result<WindowClaim, StoreError>;

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;

    async fn get_trips(&self, ids: &[Uuid]) -> Result<Vec<Trip>, StoreError>;

    async fn trips_by_transporter(&self, transporter_id: Uuid) -> Result<Vec<Trip>, StoreError>;

    /// Non-expired trips on `truck_id`, without `exclude`.
    async fn active_trips_for_truck(
        &self,
        truck_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Trip>, StoreError>;

    /// Listed, unbooked, unexpired trips departing after `now`.
    async fn search_trips(
        &self,
        query: &TripSearchQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError>;

    /// Move an unbooked trip's window, with the same per-truck overlap check
    /// as [`TripStore::insert_trip`]. `Conflict` if it got booked meanwhile.
    async fn update_schedule(
        &self,
        id: Uuid,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
    ) -> Result<WindowClaim, StoreError>;

    /// Set `is_booked` and the addresses. `Conflict` if already booked.
    async fn mark_booked(
        &self,
        id: Uuid,
        origin_address: &str,
        destination_address: &str,
    ) -> Result<(), StoreError>;

    /// Clear `is_booked` and both addresses.
    async fn mark_unbooked(&self, id: Uuid) -> Result<(), StoreError>;

    async fn set_listed(&self, id: Uuid, listed: bool) -> Result<(), StoreError>;

    /// Delete a trip no purchase refers to. `Conflict` if booked or if a
    /// settled booking is kept on it, `NotFound` if missing.
    async fn delete_trip(&self, id: Uuid) -> Result<(), StoreError>;

    /// Flag unbooked trips that departed before `now`; returns their ids.
    async fn expire_departed(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    async fn has_payout_account(&self, transporter_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PurchaseStore: Send + Sync {
    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError>;

    /// The purchase on `trip_id` that is not in a sink, if any.
    async fn active_purchase_for_trip(&self, trip_id: Uuid)
        -> Result<Option<Purchase>, StoreError>;

    async fn purchases_by_client(&self, client_id: Uuid) -> Result<Vec<Purchase>, StoreError>;

    async fn purchases_by_transporter(
        &self,
        transporter_id: Uuid,
    ) -> Result<Vec<Purchase>, StoreError>;

    /// Compare-and-set on the status. `false` if it was no longer `from`.
    async fn update_purchase_status(
        &self,
        id: Uuid,
        from: PurchaseStatus,
        to: PurchaseStatus,
    ) -> Result<bool, StoreError>;

    /// Store a rating on a delivered purchase. `false` if not delivered.
    async fn set_rating(
        &self,
        id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn payment_for_purchase(&self, purchase_id: Uuid)
        -> Result<Option<Payment>, StoreError>;

    async fn payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError>;

    /// Compare-and-set on the status; also stamps `charged_at`/`refunded_at`.
    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool, StoreError>;

    /// Compare-and-set `from -> Refunded`, recording the amount returned.
    async fn record_refund(
        &self,
        id: Uuid,
        from: PaymentStatus,
        refunded_amount: i64,
    ) -> Result<bool, StoreError>;

    async fn store_authorization(&self, id: Uuid, code: &str) -> Result<(), StoreError>;
}

/// The record stores plus the writes that must land together
#[async_trait]
pub trait BookingStore: TripStore + PurchaseStore + PaymentStore {
    /// Book the trip (only if still unbooked) and insert the purchase and payment.
    async fn create_booking(&self, booking: &NewBooking) -> Result<(), StoreError>;

    /// Delete the purchase (only if still `expected_status`), dispose of the
    /// payment, and return the trip to unbooked availability.
    async fn dispose_booking(
        &self,
        trip_id: Uuid,
        purchase_id: Uuid,
        expected_status: PurchaseStatus,
        payment: PaymentDisposal,
    ) -> Result<(), StoreError>;

    /// Record a completed refund: purchase into its sink, payment refunded,
    /// trip unbooked and withdrawn from listing.
    async fn settle_refund(&self, settlement: &RefundSettlement) -> Result<(), StoreError>;
}

/// Where the engine drops notifications
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    async fn enqueue(&self, notification: NewNotification) -> Result<Uuid, StoreError>;
}

/// The consuming side of the outbox
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Lease up to `limit` pending notifications for delivery.
    async fn claim_pending(&self, limit: i64) -> Result<Vec<Notification>, StoreError>;

    async fn mark_delivered(&self, id: Uuid) -> Result<(), StoreError>;

    /// Count a failed attempt; the notification is `failed` once
    /// `max_attempts` is reached, otherwise it goes back to pending.
    async fn mark_attempt_failed(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError>;

    async fn inbox(&self, user_id: Uuid, query: &InboxQuery)
        -> Result<Vec<Notification>, StoreError>;

    /// `false` if the notification does not belong to `user_id`.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
}
