//! Trip service layer

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{
    find_conflicts, validate_schedule, Availability, CreateTripRequest, RescheduleTripRequest, Trip,
    TripError, TripSearchQuery,
};
use crate::store::{BookingStore, StoreError, WindowClaim};

/// Trip service for managing trip lifecycle
pub struct TripService {
    store: Arc<dyn BookingStore>,
}

impl TripService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Offer a new trip.
    pub async fn create_trip(
        &self,
        transporter_id: Uuid,
        request: CreateTripRequest,
    ) -> Result<Trip, TripError> {
        request.validate()?;
        validate_schedule(request.departure_at, request.arrival_at)?;

        let now = Utc::now();
        if request.departure_at <= now {
            return Err(TripError::InvalidSchedule(
                "departure must be in the future".to_string(),
            ));
        }

        if !self.store.has_payout_account(transporter_id).await? {
            return Err(TripError::PayoutAccountMissing);
        }

        let trip = Trip {
            id: Uuid::new_v4(),
            transporter_id,
            truck_id: request.truck_id,
            origin_city: request.origin_city.trim().to_string(),
            destination_city: request.destination_city.trim().to_string(),
            origin_address: None,
            destination_address: None,
            departure_at: request.departure_at,
            arrival_at: request.arrival_at,
            base_price: request.base_price,
            price_per_km: request.price_per_km,
            price_per_kg: request.price_per_kg,
            is_booked: false,
            is_expired: false,
            is_listed: true,
            created_at: now,
            updated_at: now,
        };
        let claim = self.store.insert_trip(&trip).await?;
        ensure_claimed(trip.truck_id, claim)?;

        tracing::info!(
            trip_id = %trip.id,
            truck_id = %trip.truck_id,
            transporter_id = %transporter_id,
            "Trip created"
        );

        Ok(trip)
    }

    /// Overlap check for one truck. The caller validates `departure < arrival`.
    pub async fn is_available(
        &self,
        truck_id: Uuid,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
        exclude_trip_id: Option<Uuid>,
    ) -> Result<Availability, TripError> {
        let existing = self
            .store
            .active_trips_for_truck(truck_id, exclude_trip_id)
            .await?;
        let conflicts = find_conflicts(&existing, departure_at, arrival_at, exclude_trip_id);
        Ok(Availability::from_conflicts(conflicts))
    }

    pub async fn get_trip(&self, id: Uuid) -> Result<Trip, TripError> {
        self.store
            .get_trip(id)
            .await?
            .ok_or(TripError::NotFound(id))
    }

    /// Trips for a list of ids; unknown ids are skipped.
    pub async fn lookup(&self, ids: &[Uuid]) -> Result<Vec<Trip>, TripError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.get_trips(ids).await?)
    }

    pub async fn trips_for_transporter(&self, transporter_id: Uuid) -> Result<Vec<Trip>, TripError> {
        Ok(self.store.trips_by_transporter(transporter_id).await?)
    }

    pub async fn search(&self, query: &TripSearchQuery) -> Result<Vec<Trip>, TripError> {
        Ok(self.store.search_trips(query, Utc::now()).await?)
    }

    async fn owned_trip(&self, transporter_id: Uuid, id: Uuid) -> Result<Trip, TripError> {
        let trip = self.get_trip(id).await?;
        if trip.transporter_id != transporter_id {
            return Err(TripError::NotOwner);
        }
        Ok(trip)
    }

    /// Move an unbooked trip to a new window.
    pub async fn reschedule(
        &self,
        transporter_id: Uuid,
        id: Uuid,
        request: RescheduleTripRequest,
    ) -> Result<Trip, TripError> {
        let trip = self.owned_trip(transporter_id, id).await?;
        if trip.is_booked {
            return Err(TripError::Booked(id));
        }
        validate_schedule(request.departure_at, request.arrival_at)?;

        let claim = self
            .store
            .update_schedule(id, request.departure_at, request.arrival_at)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => TripError::Booked(id),
                other => other.into(),
            })?;
        ensure_claimed(trip.truck_id, claim)?;

        tracing::info!(trip_id = %id, "Trip rescheduled");
        self.get_trip(id).await
    }

    /// Delete a trip that never had a booking kept on it.
    ///
    /// A cancelled or refunded booking stays attached to its trip, so such a
    /// trip can only be withdrawn from listing, not deleted.
    pub async fn delete_trip(&self, transporter_id: Uuid, id: Uuid) -> Result<(), TripError> {
        let trip = self.owned_trip(transporter_id, id).await?;
        if trip.is_booked || self.store.active_purchase_for_trip(id).await?.is_some() {
            return Err(TripError::Booked(id));
        }

        self.store.delete_trip(id).await.map_err(|e| match e {
            StoreError::Conflict(_) => TripError::HasBookingHistory(id),
            StoreError::NotFound(_) => TripError::NotFound(id),
            other => other.into(),
        })?;

        tracing::info!(trip_id = %id, "Trip deleted");
        Ok(())
    }

    /// Put a withdrawn trip back on the market.
    pub async fn relist(&self, transporter_id: Uuid, id: Uuid) -> Result<Trip, TripError> {
        let trip = self.owned_trip(transporter_id, id).await?;
        if trip.is_booked {
            return Err(TripError::Booked(id));
        }
        if trip.is_expired || trip.departure_at <= Utc::now() {
            return Err(TripError::Expired(id));
        }
        if trip.is_listed {
            return Ok(trip);
        }

        self.store.set_listed(id, true).await?;
        tracing::info!(trip_id = %id, "Trip relisted");
        self.get_trip(id).await
    }

    /// Flag unbooked trips whose departure has passed.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, TripError> {
        Ok(self.store.expire_departed(now).await?)
    }
}

fn ensure_claimed(truck_id: Uuid, claim: WindowClaim) -> Result<(), TripError> {
    match claim {
        WindowClaim::Claimed => Ok(()),
        WindowClaim::Conflicts(mut conflicts) => {
            conflicts.sort_by_key(|c| c.departure_at);
            tracing::warn!(
                truck_id = %truck_id,
                conflicts = conflicts.len(),
                "Truck unavailable for requested window"
            );
            Err(TripError::TruckUnavailable { conflicts })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, TripStore};
    use chrono::Duration;

    async fn service_with_account() -> (TripService, Arc<InMemoryStore>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let transporter = Uuid::new_v4();
        store.add_payout_account(transporter).await;
        (TripService::new(store.clone()), store, transporter)
    }

    fn request(truck_id: Uuid, departure_at: DateTime<Utc>, hours: i64) -> CreateTripRequest {
        CreateTripRequest {
            truck_id,
            origin_city: "Johannesburg".to_string(),
            destination_city: "Durban".to_string(),
            departure_at,
            arrival_at: departure_at + Duration::hours(hours),
            base_price: 100_000,
            price_per_km: 0,
            price_per_kg: 0,
        }
    }

    #[tokio::test]
    async fn test_create_requires_payout_account() {
        let store = Arc::new(InMemoryStore::new());
        let service = TripService::new(store);
        let start = Utc::now() + Duration::days(1);

        let err = service
            .create_trip(Uuid::new_v4(), request(Uuid::new_v4(), start, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, TripError::PayoutAccountMissing));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_schedule() {
        let (service, _, transporter) = service_with_account().await;
        let start = Utc::now() + Duration::days(1);

        let err = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, TripError::InvalidSchedule(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_overlap_on_same_truck() {
        let (service, _, transporter) = service_with_account().await;
        let truck = Uuid::new_v4();
        let start = Utc::now() + Duration::days(2);

        let first = service
            .create_trip(transporter, request(truck, start, 10))
            .await
            .unwrap();

        let err = service
            .create_trip(transporter, request(truck, start + Duration::hours(9), 3))
            .await
            .unwrap_err();
        match err {
            TripError::TruckUnavailable { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].id, first.id);
            }
            other => panic!("expected TruckUnavailable, got {other:?}"),
        }

        // another truck is free
        service
            .create_trip(transporter, request(Uuid::new_v4(), start, 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_on_one_truck_admit_one() {
        let (service, store, transporter) = service_with_account().await;
        let truck = Uuid::new_v4();
        let start = Utc::now() + Duration::days(2);

        let (a, b) = tokio::join!(
            service.create_trip(transporter, request(truck, start, 10)),
            service.create_trip(transporter, request(truck, start + Duration::hours(5), 10)),
        );

        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(TripError::TruckUnavailable { .. })
        ));
        assert_eq!(store.active_trips_for_truck(truck, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reschedule_onto_another_trip_is_refused() {
        let (service, _, transporter) = service_with_account().await;
        let truck = Uuid::new_v4();
        let start = Utc::now() + Duration::days(2);
        let first = service
            .create_trip(transporter, request(truck, start, 4))
            .await
            .unwrap();
        let second = service
            .create_trip(transporter, request(truck, start + Duration::hours(6), 4))
            .await
            .unwrap();

        let err = service
            .reschedule(
                transporter,
                second.id,
                RescheduleTripRequest {
                    departure_at: start + Duration::hours(4),
                    arrival_at: start + Duration::hours(8),
                },
            )
            .await
            .unwrap_err();
        match err {
            TripError::TruckUnavailable { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].id, first.id);
            }
            other => panic!("expected TruckUnavailable, got {other:?}"),
        }
        let unchanged = service.get_trip(second.id).await.unwrap();
        assert_eq!(unchanged.departure_at, start + Duration::hours(6));
    }

    #[tokio::test]
    async fn test_reschedule_ignores_own_window() {
        let (service, _, transporter) = service_with_account().await;
        let start = Utc::now() + Duration::days(2);
        let trip = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 10))
            .await
            .unwrap();

        let moved = service
            .reschedule(
                transporter,
                trip.id,
                RescheduleTripRequest {
                    departure_at: start + Duration::hours(2),
                    arrival_at: start + Duration::hours(12),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.departure_at, start + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_delete_refuses_booked_trip_and_other_owner() {
        let (service, store, transporter) = service_with_account().await;
        let start = Utc::now() + Duration::days(2);
        let trip = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 5))
            .await
            .unwrap();

        let err = service
            .delete_trip(Uuid::new_v4(), trip.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TripError::NotOwner));

        store.mark_booked(trip.id, "a", "b").await.unwrap();
        let err = service.delete_trip(transporter, trip.id).await.unwrap_err();
        assert!(matches!(err, TripError::Booked(_)));

        store.mark_unbooked(trip.id).await.unwrap();
        service.delete_trip(transporter, trip.id).await.unwrap();
        assert!(matches!(
            service.get_trip(trip.id).await,
            Err(TripError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expiry_sweep_only_flags_unbooked_departed_trips() {
        let (service, store, transporter) = service_with_account().await;
        let start = Utc::now() + Duration::hours(1);
        let open = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 5))
            .await
            .unwrap();
        let booked = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 5))
            .await
            .unwrap();
        store.mark_booked(booked.id, "a", "b").await.unwrap();

        let later = start + Duration::minutes(30);
        let expired = service.run_expiry_sweep(later).await.unwrap();
        assert_eq!(expired, vec![open.id]);

        assert!(service.get_trip(open.id).await.unwrap().is_expired);
        assert!(!service.get_trip(booked.id).await.unwrap().is_expired);

        // second run finds nothing new
        assert!(service.run_expiry_sweep(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relist_restores_withdrawn_trip() {
        let (service, store, transporter) = service_with_account().await;
        let start = Utc::now() + Duration::days(3);
        let trip = service
            .create_trip(transporter, request(Uuid::new_v4(), start, 5))
            .await
            .unwrap();
        store.set_listed(trip.id, false).await.unwrap();

        let relisted = service.relist(transporter, trip.id).await.unwrap();
        assert!(relisted.is_listed);
    }
}
