//! Booking service layer

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use super::{
    BookTripRequest, BookingClient, BookingDetails, BookingError, BookingReceipt, InFlight,
    InFlightPermit, PricingPolicy, Purchase, PurchaseStatus, RateTripRequest,
};
use crate::auth::{Identity, UserRole};
use crate::config::Config;
use crate::geocode::{haversine_km, Geocoder};
use crate::notification::{NewNotification, NotificationKind, Notifier};
use crate::payment::{
    payment_reference, GatewayError, InitializePayment, Payment, PaymentGateway, PaymentStatus,
};
use crate::store::{BookingStore, NewBooking, StoreError};
use crate::trip::Trip;

/// Commercial and timing knobs of the booking engine
#[derive(Debug, Clone)]
pub struct BookingSettings {
    pub pricing: PricingPolicy,
    pub currency: String,
    /// Upper bound on any single gateway call.
    pub gateway_timeout: Duration,
}

impl BookingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pricing: PricingPolicy {
                service_fee_bps: config.service_fee_bps,
                commission_bps: config.commission_bps,
            },
            currency: config.payment_currency.clone(),
            gateway_timeout: Duration::from_secs(config.gateway_timeout_secs),
        }
    }
}

/// Booking service: creation, status transitions and cancellation
pub struct BookingService {
    pub(super) store: Arc<dyn BookingStore>,
    pub(super) gateway: Arc<dyn PaymentGateway>,
    pub(super) geocoder: Arc<dyn Geocoder>,
    pub(super) notifier: Notifier,
    pub(super) settings: BookingSettings,
    pub(super) in_flight: InFlight,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        geocoder: Arc<dyn Geocoder>,
        notifier: Notifier,
        settings: BookingSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            geocoder,
            notifier,
            settings,
            in_flight: InFlight::new(),
        }
    }

    /// Book a trip for a client.
    ///
    /// Nothing is written until the gateway has opened the payment; the trip,
    /// purchase and payment are then written together.
    pub async fn book_trip(
        &self,
        trip_id: Uuid,
        client: BookingClient,
        request: BookTripRequest,
    ) -> Result<BookingReceipt, BookingError> {
        request.validate()?;
        let pickup = required(&request.pickup_address, "pickup address")?;
        let delivery = required(&request.delivery_address, "delivery address")?;
        let freight_notes = optional(request.freight_notes, "freight notes")?;
        let pickup_instructions = optional(request.pickup_instructions, "pickup instructions")?;
        let delivery_instructions =
            optional(request.delivery_instructions, "delivery instructions")?;

        let now = Utc::now();
        let trip = self.bookable_trip(trip_id).await?;
        if trip.transporter_id == client.id {
            return Err(BookingError::Forbidden(
                "transporters cannot book their own trips".to_string(),
            ));
        }

        let from = self.geocoder.geocode(pickup).await?;
        let to = self.geocoder.geocode(delivery).await?;
        let distance_km = haversine_km(from, to);

        let price = self
            .settings
            .pricing
            .quote(&trip, distance_km, request.cargo_weight_kg)
            .ok_or_else(|| {
                BookingError::InvalidRequest("booking price is out of range".to_string())
            })?;

        // geocoding can be slow; do not open a payment for a trip taken meanwhile
        self.bookable_trip(trip_id).await?;

        let purchase_id = Uuid::new_v4();
        let reference = payment_reference(purchase_id);
        let opened = self
            .with_gateway_timeout(self.gateway.initialize(&InitializePayment {
                email: client.email.clone(),
                amount: price.total_amount,
                reference: reference.clone(),
                currency: self.settings.currency.clone(),
            }))
            .await?;

        let purchase = Purchase {
            id: purchase_id,
            trip_id,
            client_id: client.id,
            status: PurchaseStatus::AwaitingConfirmation,
            purchased_at: now,
            cargo_weight_kg: request.cargo_weight_kg,
            distance_km,
            freight_notes,
            pickup_instructions,
            delivery_instructions,
            trip_total: price.trip_total,
            service_fee: price.service_fee,
            commission_amount: price.commission_amount,
            transporter_amount: price.transporter_amount,
            rating: None,
            comment: None,
            updated_at: now,
        };
        let payment = Payment {
            id: Uuid::new_v4(),
            purchase_id,
            client_id: client.id,
            status: PaymentStatus::Pending,
            total_amount: price.total_amount,
            transporter_amount: price.transporter_amount,
            commission_amount: price.commission_amount,
            service_fee: price.service_fee,
            currency: self.settings.currency.clone(),
            customer_email: client.email,
            gateway_reference: Some(opened.reference),
            authorization_url: Some(opened.authorization_url.clone()),
            authorization_code: None,
            refunded_amount: None,
            charged_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        let booking = NewBooking {
            trip_id,
            origin_address: pickup.to_string(),
            destination_address: delivery.to_string(),
            purchase,
            payment,
        };
        match self.store.create_booking(&booking).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                tracing::error!(
                    trip_id = %trip_id,
                    reference = %reference,
                    amount = price.total_amount,
                    "Trip was booked by someone else while the payment was opened; \
                     the gateway transaction is orphaned and needs reconciling"
                );
                return Err(BookingError::TripUnavailable(
                    "trip is already booked".to_string(),
                ));
            }
            Err(StoreError::NotFound(_)) => return Err(BookingError::TripNotFound(trip_id)),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            purchase_id = %purchase_id,
            trip_id = %trip_id,
            client_id = %booking.purchase.client_id,
            total_amount = booking.payment.total_amount,
            "Trip booked"
        );

        self.notifier
            .notify(
                NewNotification::new(
                    trip.transporter_id,
                    NotificationKind::BookingRequested,
                    format!(
                        "New booking request for your trip {} → {}.",
                        trip.origin_city, trip.destination_city
                    ),
                )
                .with_meta(serde_json::json!({
                    "trip_id": trip_id,
                    "purchase_id": purchase_id,
                })),
            )
            .await;

        Ok(BookingReceipt {
            purchase: booking.purchase,
            payment: booking.payment,
            authorization_url: opened.authorization_url,
        })
    }

    /// One booking with its trip and payment, visible to the client, the
    /// trip's transporter and admins.
    pub async fn get_booking(
        &self,
        purchase_id: Uuid,
        viewer: &Identity,
    ) -> Result<BookingDetails, BookingError> {
        let purchase = self.purchase(purchase_id).await?;
        let trip = self.trip_of(&purchase).await?;

        let allowed = viewer.role == UserRole::Admin
            || viewer.user_id == purchase.client_id
            || viewer.user_id == trip.transporter_id;
        if !allowed {
            return Err(BookingError::Forbidden(
                "this booking belongs to someone else".to_string(),
            ));
        }

        let payment = self.store.payment_for_purchase(purchase_id).await?;
        Ok(BookingDetails {
            purchase,
            trip,
            payment,
        })
    }

    /// The caller's bookings: purchases on their trips for transporters,
    /// their own purchases otherwise.
    pub async fn list_bookings(&self, viewer: &Identity) -> Result<Vec<Purchase>, BookingError> {
        let purchases = match viewer.role {
            UserRole::Transporter => self.store.purchases_by_transporter(viewer.user_id).await?,
            UserRole::Client | UserRole::Admin => {
                self.store.purchases_by_client(viewer.user_id).await?
            }
        };
        Ok(purchases)
    }

    /// Rate a delivered trip.
    pub async fn rate_trip(
        &self,
        purchase_id: Uuid,
        client_id: Uuid,
        request: RateTripRequest,
    ) -> Result<Purchase, BookingError> {
        request.validate()?;

        let purchase = self.purchase(purchase_id).await?;
        if purchase.client_id != client_id {
            return Err(BookingError::Forbidden(
                "only the booking client can rate this trip".to_string(),
            ));
        }

        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if !self
            .store
            .set_rating(purchase_id, request.rating, comment)
            .await?
        {
            return Err(BookingError::NotRateable(purchase_id));
        }

        tracing::info!(purchase_id = %purchase_id, rating = request.rating, "Trip rated");
        self.purchase(purchase_id).await
    }

    async fn bookable_trip(&self, trip_id: Uuid) -> Result<Trip, BookingError> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or(BookingError::TripNotFound(trip_id))?;

        let now = Utc::now();
        if !trip.is_bookable(now) {
            return Err(BookingError::TripUnavailable(unavailable_reason(&trip, now)));
        }
        Ok(trip)
    }

    pub(super) async fn purchase(&self, purchase_id: Uuid) -> Result<Purchase, BookingError> {
        self.store
            .get_purchase(purchase_id)
            .await?
            .ok_or(BookingError::PurchaseNotFound(purchase_id))
    }

    pub(super) async fn trip_of(&self, purchase: &Purchase) -> Result<Trip, BookingError> {
        self.store
            .get_trip(purchase.trip_id)
            .await?
            .ok_or(BookingError::TripNotFound(purchase.trip_id))
    }

    pub(super) fn acquire(&self, purchase_id: Uuid) -> Result<InFlightPermit, BookingError> {
        self.in_flight
            .try_acquire(purchase_id)
            .ok_or(BookingError::OperationInFlight(purchase_id))
    }

    /// Bound a gateway call; a call that does not answer in time is a failure.
    pub(super) async fn with_gateway_timeout<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.settings.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.settings.gateway_timeout)),
        }
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, BookingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BookingError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Absent is fine; present but blank is not.
fn optional(value: Option<String>, field: &str) -> Result<Option<String>, BookingError> {
    match value {
        None => Ok(None),
        Some(v) => required(&v, field).map(|t| Some(t.to_string())),
    }
}

fn unavailable_reason(trip: &Trip, now: chrono::DateTime<Utc>) -> String {
    if trip.is_booked {
        "trip is already booked".to_string()
    } else if trip.is_expired || trip.departure_at <= now {
        "trip has already departed".to_string()
    } else {
        "trip is not listed".to_string()
    }
}
