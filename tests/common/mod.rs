//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use freightlane_server::booking::{
    BookTripRequest, BookingClient, BookingReceipt, BookingService, BookingSettings, PricingPolicy,
};
use freightlane_server::geocode::{Coordinates, GeocodeError, Geocoder};
use freightlane_server::notification::{NotificationKind, Notifier};
use freightlane_server::payment::{
    apply_webhook, ChargeStatus, GatewayError, GatewayWebhook, InitializePayment, Payment,
    PaymentGateway, PaymentInitialization, RefundReceipt, WebhookOutcome,
};
use freightlane_server::store::{BookingStore, InMemoryStore};
use freightlane_server::trip::{CreateTripRequest, Trip, TripService};

/// How the scripted gateway answers a refund
#[derive(Clone)]
pub enum RefundScript {
    Accept,
    /// Answers with `ok: false`.
    Decline,
    Error,
    /// Never answers.
    Hang,
    /// Waits until the notify fires, then accepts.
    Hold(Arc<Notify>),
}

/// How the scripted gateway answers a capture
#[derive(Clone)]
pub enum ChargeScript {
    Answer(ChargeStatus),
    Error,
}

/// In-process payment gateway that records every call
pub struct ScriptedGateway {
    refund_script: Mutex<RefundScript>,
    charge_script: Mutex<ChargeScript>,
    refunds: Mutex<Vec<(String, i64)>>,
    charges: Mutex<Vec<Uuid>>,
    initialized: Mutex<Vec<String>>,
    /// Fires each time a refund call reaches the gateway.
    pub refund_started: Notify,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            refund_script: Mutex::new(RefundScript::Accept),
            charge_script: Mutex::new(ChargeScript::Answer(ChargeStatus::Success)),
            refunds: Mutex::new(Vec::new()),
            charges: Mutex::new(Vec::new()),
            initialized: Mutex::new(Vec::new()),
            refund_started: Notify::new(),
        }
    }
}

impl ScriptedGateway {
    pub fn script_refund(&self, script: RefundScript) {
        *self.refund_script.lock().unwrap() = script;
    }

    pub fn script_charge(&self, script: ChargeScript) {
        *self.charge_script.lock().unwrap() = script;
    }

    /// `(reference, amount)` of every refund requested.
    pub fn refunds(&self) -> Vec<(String, i64)> {
        self.refunds.lock().unwrap().clone()
    }

    /// References of every transaction opened.
    pub fn initialized(&self) -> Vec<String> {
        self.initialized.lock().unwrap().clone()
    }

    /// Payment ids of every capture requested.
    pub fn charges(&self) -> Vec<Uuid> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<PaymentInitialization, GatewayError> {
        self.initialized
            .lock()
            .unwrap()
            .push(request.reference.clone());
        Ok(PaymentInitialization {
            authorization_url: format!("https://checkout.test/{}", request.reference),
            reference: request.reference.clone(),
        })
    }

    async fn charge(&self, payment: &Payment) -> Result<ChargeStatus, GatewayError> {
        self.charges.lock().unwrap().push(payment.id);
        let script = self.charge_script.lock().unwrap().clone();
        match script {
            ChargeScript::Answer(status) => Ok(status),
            ChargeScript::Error => Err(GatewayError::Api {
                endpoint: "/transaction/charge_authorization".to_string(),
                status: 502,
                message: "upstream unavailable".to_string(),
            }),
        }
    }

    async fn refund(&self, reference: &str, amount: i64) -> Result<RefundReceipt, GatewayError> {
        self.refunds
            .lock()
            .unwrap()
            .push((reference.to_string(), amount));
        self.refund_started.notify_one();

        let script = self.refund_script.lock().unwrap().clone();
        match script {
            RefundScript::Accept => Ok(RefundReceipt {
                ok: true,
                detail: "refund processed".to_string(),
            }),
            RefundScript::Decline => Ok(RefundReceipt {
                ok: false,
                detail: "refund failed".to_string(),
            }),
            RefundScript::Error => Err(GatewayError::Api {
                endpoint: "/refund".to_string(),
                status: 400,
                message: "Transaction has been fully reversed".to_string(),
            }),
            RefundScript::Hang => std::future::pending().await,
            RefundScript::Hold(release) => {
                release.notified().await;
                Ok(RefundReceipt {
                    ok: true,
                    detail: "refund processed".to_string(),
                })
            }
        }
    }
}

pub const JOHANNESBURG: Coordinates = Coordinates {
    lat: -26.2041,
    lon: 28.0473,
};
pub const DURBAN: Coordinates = Coordinates {
    lat: -29.8587,
    lon: 31.0218,
};

/// Resolves anything mentioning Durban to Durban, "nowhere" to no match,
/// everything else to Johannesburg.
pub struct FixtureGeocoder;

#[async_trait]
impl Geocoder for FixtureGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let lowered = address.to_lowercase();
        if lowered.contains("nowhere") {
            Err(GeocodeError::NoMatch(address.to_string()))
        } else if lowered.contains("durban") {
            Ok(DURBAN)
        } else {
            Ok(JOHANNESBURG)
        }
    }
}

pub fn settings(gateway_timeout: Duration) -> BookingSettings {
    BookingSettings {
        pricing: PricingPolicy {
            service_fee_bps: 500,
            commission_bps: 1000,
        },
        currency: "ZAR".to_string(),
        gateway_timeout,
    }
}

/// A trip that has been booked, authorized and confirmed with a captured payment
pub struct ChargedBooking {
    pub trip: Trip,
    pub client: BookingClient,
    pub receipt: BookingReceipt,
}

impl ChargedBooking {
    pub fn purchase_id(&self) -> Uuid {
        self.receipt.purchase.id
    }

    pub fn payment_id(&self) -> Uuid {
        self.receipt.payment.id
    }

    pub fn reference(&self) -> String {
        self.receipt.payment.gateway_reference.clone().unwrap()
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub bookings: Arc<BookingService>,
    pub trips: TripService,
    pub transporter_id: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(gateway_timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let transporter_id = Uuid::new_v4();
        store.add_payout_account(transporter_id).await;

        let booking_store: Arc<dyn BookingStore> = store.clone();
        let bookings = BookingService::new(
            booking_store.clone(),
            gateway.clone(),
            Arc::new(FixtureGeocoder),
            Notifier::new(store.clone()),
            settings(gateway_timeout),
        );

        Self {
            store,
            gateway,
            bookings: Arc::new(bookings),
            trips: TripService::new(booking_store),
            transporter_id,
        }
    }

    /// R1000 flat trip, departing in two days on a fresh truck.
    pub async fn offer_trip(&self) -> Trip {
        let departure_at = Utc::now() + ChronoDuration::days(2);
        self.trips
            .create_trip(
                self.transporter_id,
                CreateTripRequest {
                    truck_id: Uuid::new_v4(),
                    origin_city: "Johannesburg".to_string(),
                    destination_city: "Durban".to_string(),
                    departure_at,
                    arrival_at: departure_at + ChronoDuration::hours(8),
                    base_price: 100_000,
                    price_per_km: 0,
                    price_per_kg: 0,
                },
            )
            .await
            .expect("trip should be created")
    }

    pub fn client() -> BookingClient {
        BookingClient {
            id: Uuid::new_v4(),
            email: "client@example.com".to_string(),
        }
    }

    pub fn booking_request() -> BookTripRequest {
        BookTripRequest {
            pickup_address: "12 Main Rd, Johannesburg".to_string(),
            delivery_address: "4 Point Rd, Durban".to_string(),
            cargo_weight_kg: 500.0,
            freight_notes: Some("Palletised".to_string()),
            pickup_instructions: None,
            delivery_instructions: None,
        }
    }

    pub async fn book(&self, trip: &Trip, client: &BookingClient) -> BookingReceipt {
        self.bookings
            .book_trip(trip.id, client.clone(), Self::booking_request())
            .await
            .expect("booking should succeed")
    }

    /// Deliver the gateway's `charge.success` webhook for the initial transaction.
    pub async fn authorize(&self, payment: &Payment) -> WebhookOutcome {
        let hook = webhook(
            "charge.success",
            payment.gateway_reference.as_deref().unwrap(),
        );
        apply_webhook(self.store.as_ref(), &hook).await.unwrap()
    }

    /// Book, authorize and confirm a trip so its payment is captured.
    pub async fn charged_booking(&self) -> ChargedBooking {
        let trip = self.offer_trip().await;
        let client = Self::client();
        let receipt = self.book(&trip, &client).await;
        self.authorize(&receipt.payment).await;
        self.bookings
            .advance_status(receipt.purchase.id, self.transporter_id)
            .await
            .expect("confirmation should succeed");

        ChargedBooking {
            trip,
            client,
            receipt,
        }
    }

    pub async fn notifications_for(&self, user_id: Uuid, kind: NotificationKind) -> usize {
        self.store
            .notifications()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && n.kind == kind)
            .count()
    }
}

pub fn webhook(event: &str, reference: &str) -> GatewayWebhook {
    serde_json::from_value(serde_json::json!({
        "event": event,
        "data": {
            "reference": reference,
            "authorization": { "authorization_code": "AUTH_test", "reusable": true }
        }
    }))
    .unwrap()
}
