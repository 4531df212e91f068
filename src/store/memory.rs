//! In-memory record store
//!
//! All records sit behind one lock, so every operation (composites included)
//! is trivially atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BookingStore, NewBooking, NotificationOutbox, NotificationQueue, PaymentDisposal, PaymentStore,
    PurchaseStore, RefundSettlement, StoreError, TripStore, WindowClaim,
};
use crate::booking::{Purchase, PurchaseStatus};
use crate::notification::{DeliveryStatus, InboxQuery, NewNotification, Notification};
use crate::payment::{Payment, PaymentStatus};
use crate::trip::{find_conflicts, Trip, TripSearchQuery};

#[derive(Default)]
struct Inner {
    trips: HashMap<Uuid, Trip>,
    purchases: HashMap<Uuid, Purchase>,
    payments: HashMap<Uuid, Payment>,
    notifications: Vec<Notification>,
    leased: HashSet<Uuid>,
    payout_accounts: HashSet<Uuid>,
}

/// Store used by the test-suite
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_payout_account(&self, transporter_id: Uuid) {
        self.inner.write().await.payout_accounts.insert(transporter_id);
    }

    /// Every notification ever enqueued, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.inner.read().await.notifications.clone()
    }

    pub async fn purchase_count(&self) -> usize {
        self.inner.read().await.purchases.len()
    }

    /// Overwrite a payment, for setting up gateway-side states in tests.
    pub async fn put_payment(&self, payment: Payment) {
        self.inner.write().await.payments.insert(payment.id, payment);
    }

    pub async fn get_payment(&self, id: Uuid) -> Option<Payment> {
        self.inner.read().await.payments.get(&id).cloned()
    }

    /// Drop a payment record, leaving its purchase behind.
    pub async fn remove_payment(&self, id: Uuid) -> Option<Payment> {
        self.inner.write().await.payments.remove(&id)
    }
}

fn city_matches(filter: &Option<String>, city: &str) -> bool {
    filter
        .as_deref()
        .map_or(true, |f| f.trim().eq_ignore_ascii_case(city))
}

fn unbook(trip: &mut Trip, now: DateTime<Utc>) {
    trip.is_booked = false;
    trip.origin_address = None;
    trip.destination_address = None;
    trip.updated_at = now;
}

#[async_trait]
impl TripStore for InMemoryStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<WindowClaim, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.trips.contains_key(&trip.id) {
            return Err(StoreError::Conflict(format!("trip {} exists", trip.id)));
        }
        let conflicts = find_conflicts(
            inner.trips.values().filter(|t| t.truck_id == trip.truck_id),
            trip.departure_at,
            trip.arrival_at,
            None,
        );
        if !conflicts.is_empty() {
            return Ok(WindowClaim::Conflicts(conflicts));
        }
        inner.trips.insert(trip.id, trip.clone());
        Ok(WindowClaim::Claimed)
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        Ok(self.inner.read().await.trips.get(&id).cloned())
    }

    async fn get_trips(&self, ids: &[Uuid]) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.trips.get(id).cloned()).collect())
    }

    async fn trips_by_transporter(&self, transporter_id: Uuid) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.transporter_id == transporter_id)
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.departure_at);
        Ok(trips)
    }

    async fn active_trips_for_truck(
        &self,
        truck_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .trips
            .values()
            .filter(|t| t.truck_id == truck_id && !t.is_expired && Some(t.id) != exclude)
            .cloned()
            .collect())
    }

    async fn search_trips(
        &self,
        query: &TripSearchQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.is_bookable(now))
            .filter(|t| city_matches(&query.origin_city, &t.origin_city))
            .filter(|t| city_matches(&query.destination_city, &t.destination_city))
            .filter(|t| query.departs_after.map_or(true, |a| t.departure_at >= a))
            .filter(|t| query.departs_before.map_or(true, |b| t.departure_at <= b))
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.departure_at);

        let (limit, offset) = query.page_window();
        Ok(trips
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
    ) -> Result<WindowClaim, StoreError> {
        let mut inner = self.inner.write().await;
        let truck_id = match inner.trips.get(&id) {
            None => return Err(StoreError::NotFound(format!("trip {}", id))),
            Some(trip) if trip.is_booked => {
                return Err(StoreError::Conflict(format!("trip {} is booked", id)))
            }
            Some(trip) => trip.truck_id,
        };
        let conflicts = find_conflicts(
            inner.trips.values().filter(|t| t.truck_id == truck_id),
            departure_at,
            arrival_at,
            Some(id),
        );
        if !conflicts.is_empty() {
            return Ok(WindowClaim::Conflicts(conflicts));
        }

        if let Some(trip) = inner.trips.get_mut(&id) {
            trip.departure_at = departure_at;
            trip.arrival_at = arrival_at;
            trip.updated_at = Utc::now();
        }
        Ok(WindowClaim::Claimed)
    }

    async fn mark_booked(
        &self,
        id: Uuid,
        origin_address: &str,
        destination_address: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let trip = inner
            .trips
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", id)))?;
        if trip.is_booked {
            return Err(StoreError::Conflict(format!("trip {} is already booked", id)));
        }
        trip.is_booked = true;
        trip.origin_address = Some(origin_address.to_string());
        trip.destination_address = Some(destination_address.to_string());
        trip.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_unbooked(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let trip = inner
            .trips
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", id)))?;
        unbook(trip, Utc::now());
        Ok(())
    }

    async fn set_listed(&self, id: Uuid, listed: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let trip = inner
            .trips
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", id)))?;
        trip.is_listed = listed;
        trip.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_trip(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let has_purchases = inner.purchases.values().any(|p| p.trip_id == id);
        match inner.trips.get(&id).map(|t| t.is_booked) {
            None => Err(StoreError::NotFound(format!("trip {}", id))),
            Some(true) => Err(StoreError::Conflict(format!("trip {} is booked", id))),
            Some(false) if has_purchases => Err(StoreError::Conflict(format!(
                "trip {} has booking history",
                id
            ))),
            Some(false) => {
                inner.trips.remove(&id);
                Ok(())
            }
        }
    }

    async fn expire_departed(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let mut inner = self.inner.write().await;
        let mut expired = Vec::new();
        for trip in inner.trips.values_mut() {
            if !trip.is_booked && !trip.is_expired && trip.departure_at < now {
                trip.is_expired = true;
                trip.updated_at = now;
                expired.push(trip.id);
            }
        }
        Ok(expired)
    }

    async fn has_payout_account(&self, transporter_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .payout_accounts
            .contains(&transporter_id))
    }
}

#[async_trait]
impl PurchaseStore for InMemoryStore {
    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        Ok(self.inner.read().await.purchases.get(&id).cloned())
    }

    async fn active_purchase_for_trip(
        &self,
        trip_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .purchases
            .values()
            .find(|p| p.trip_id == trip_id && !p.status.is_sink())
            .cloned())
    }

    async fn purchases_by_client(&self, client_id: Uuid) -> Result<Vec<Purchase>, StoreError> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<Purchase> = inner
            .purchases
            .values()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(purchases)
    }

    async fn purchases_by_transporter(
        &self,
        transporter_id: Uuid,
    ) -> Result<Vec<Purchase>, StoreError> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<Purchase> = inner
            .purchases
            .values()
            .filter(|p| {
                inner
                    .trips
                    .get(&p.trip_id)
                    .map_or(false, |t| t.transporter_id == transporter_id)
            })
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at));
        Ok(purchases)
    }

    async fn update_purchase_status(
        &self,
        id: Uuid,
        from: PurchaseStatus,
        to: PurchaseStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.purchases.get_mut(&id) {
            Some(p) if p.status == from => {
                p.status = to;
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_rating(
        &self,
        id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.purchases.get_mut(&id) {
            Some(p) if p.status == PurchaseStatus::Delivered => {
                p.rating = Some(rating);
                p.comment = comment.map(str::to_string);
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn payment_for_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.purchase_id == purchase_id)
            .cloned())
    }

    async fn payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.gateway_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.payments.get_mut(&id) {
            Some(p) if p.status == from => {
                let now = Utc::now();
                p.status = to;
                p.updated_at = now;
                match to {
                    PaymentStatus::Charged => p.charged_at = Some(now),
                    PaymentStatus::Refunded => p.refunded_at = Some(now),
                    _ => {}
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_refund(
        &self,
        id: Uuid,
        from: PaymentStatus,
        refunded_amount: i64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.payments.get_mut(&id) {
            Some(p) if p.status == from => {
                let now = Utc::now();
                p.status = PaymentStatus::Refunded;
                p.refunded_amount = Some(refunded_amount);
                p.refunded_at = Some(now);
                p.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn store_authorization(&self, id: Uuid, code: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
        payment.authorization_code = Some(code.to_string());
        payment.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn create_booking(&self, booking: &NewBooking) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let trip = inner
            .trips
            .get_mut(&booking.trip_id)
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", booking.trip_id)))?;
        if trip.is_booked {
            return Err(StoreError::Conflict(format!(
                "trip {} is already booked",
                booking.trip_id
            )));
        }
        trip.is_booked = true;
        trip.origin_address = Some(booking.origin_address.clone());
        trip.destination_address = Some(booking.destination_address.clone());
        trip.updated_at = booking.purchase.purchased_at;

        inner
            .purchases
            .insert(booking.purchase.id, booking.purchase.clone());
        inner
            .payments
            .insert(booking.payment.id, booking.payment.clone());
        Ok(())
    }

    async fn dispose_booking(
        &self,
        trip_id: Uuid,
        purchase_id: Uuid,
        expected_status: PurchaseStatus,
        payment: PaymentDisposal,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.purchases.get(&purchase_id) {
            Some(p) if p.status == expected_status => {}
            Some(p) => {
                return Err(StoreError::Conflict(format!(
                    "purchase {} is {}",
                    purchase_id, p.status
                )))
            }
            None => return Err(StoreError::NotFound(format!("purchase {}", purchase_id))),
        }
        if !inner.trips.contains_key(&trip_id) {
            return Err(StoreError::NotFound(format!("trip {}", trip_id)));
        }

        let now = Utc::now();
        match payment {
            PaymentDisposal::None => {}
            PaymentDisposal::Delete(id) => {
                inner.payments.remove(&id);
            }
            PaymentDisposal::Retain {
                id,
                status,
                refunded_amount,
            } => {
                let record = inner
                    .payments
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
                record.status = status;
                record.refunded_amount = refunded_amount;
                if status == PaymentStatus::Refunded {
                    record.refunded_at = Some(now);
                }
                record.updated_at = now;
            }
        }

        inner.purchases.remove(&purchase_id);
        if let Some(trip) = inner.trips.get_mut(&trip_id) {
            unbook(trip, now);
        }
        Ok(())
    }

    async fn settle_refund(&self, s: &RefundSettlement) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.purchases.get(&s.purchase_id) {
            Some(p) if p.status == s.expected_status => {}
            Some(p) => {
                return Err(StoreError::Conflict(format!(
                    "purchase {} is {}",
                    s.purchase_id, p.status
                )))
            }
            None => return Err(StoreError::NotFound(format!("purchase {}", s.purchase_id))),
        }
        if !inner.payments.contains_key(&s.payment_id) {
            return Err(StoreError::NotFound(format!("payment {}", s.payment_id)));
        }
        if !inner.trips.contains_key(&s.trip_id) {
            return Err(StoreError::NotFound(format!("trip {}", s.trip_id)));
        }

        if let Some(p) = inner.purchases.get_mut(&s.purchase_id) {
            p.status = s.new_status;
            p.updated_at = s.settled_at;
        }
        if let Some(payment) = inner.payments.get_mut(&s.payment_id) {
            payment.status = PaymentStatus::Refunded;
            payment.refunded_amount = Some(s.refunded_amount);
            payment.refunded_at = Some(s.settled_at);
            payment.updated_at = s.settled_at;
        }
        if let Some(trip) = inner.trips.get_mut(&s.trip_id) {
            unbook(trip, s.settled_at);
            trip.is_listed = false;
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationOutbox for InMemoryStore {
    async fn enqueue(&self, notification: NewNotification) -> Result<Uuid, StoreError> {
        let record = Notification::from_new(notification, Utc::now());
        let id = record.id;
        self.inner.write().await.notifications.push(record);
        Ok(id)
    }
}

#[async_trait]
impl NotificationQueue for InMemoryStore {
    async fn claim_pending(&self, limit: i64) -> Result<Vec<Notification>, StoreError> {
        let mut inner = self.inner.write().await;
        let claimed: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.status == DeliveryStatus::Pending && !inner.leased.contains(&n.id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        for n in &claimed {
            inner.leased.insert(n.id);
        }
        Ok(claimed)
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.leased.remove(&id);
        if let Some(n) = inner.notifications.iter_mut().find(|n| n.id == id) {
            n.status = DeliveryStatus::Delivered;
            n.attempts += 1;
            n.delivered_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_attempt_failed(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.leased.remove(&id);
        if let Some(n) = inner.notifications.iter_mut().find(|n| n.id == id) {
            n.attempts += 1;
            n.last_error = Some(error.to_string());
            if n.attempts >= max_attempts {
                n.status = DeliveryStatus::Failed;
            }
        }
        Ok(())
    }

    async fn inbox(
        &self,
        user_id: Uuid,
        query: &InboxQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let inner = self.inner.read().await;
        let limit = query.limit.unwrap_or(50).clamp(1, 200) as usize;
        Ok(inner
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .filter(|n| !query.unread_only || n.read_at.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(n) => {
                n.read_at.get_or_insert_with(Utc::now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
