//! Payment models and gateway webhook payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status as tracked by the booking engine
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    /// The client authorized the charge at the gateway; funds can be captured.
    PaymentRequested,
    Charged,
    /// Payout to the transporter settled.
    Released,
    Failed,
    Refunded,
    RefundFailed,
    Forfeited,
}

/// Payment record for one booking
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub client_id: Uuid,
    pub status: PaymentStatus,
    /// Charged to the client: trip total plus service fee.
    pub total_amount: i64,
    pub transporter_amount: i64,
    pub commission_amount: i64,
    pub service_fee: i64,
    pub currency: String,
    pub customer_email: String,
    pub gateway_reference: Option<String>,
    pub authorization_url: Option<String>,
    #[serde(skip_serializing)]
    pub authorization_code: Option<String>,
    pub refunded_amount: Option<i64>,
    pub charged_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gateway webhook payload
#[derive(Debug, Deserialize)]
pub struct GatewayWebhook {
    pub event: String,
    pub data: GatewayWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct GatewayWebhookData {
    /// Transaction reference; for refund and transfer events this is the
    /// original transaction reference.
    #[serde(alias = "transaction_reference")]
    pub reference: String,
    #[serde(default)]
    pub authorization: Option<GatewayAuthorization>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayAuthorization {
    pub authorization_code: String,
    #[serde(default)]
    pub reusable: Option<bool>,
}

/// Suffix on the reference of a capture against a stored authorization.
pub const CAPTURE_REFERENCE_SUFFIX: &str = "-C";

/// Recognised webhook events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The client authorized the initial transaction.
    ChargeSucceeded { authorization_code: Option<String> },
    ChargeFailed { reason: Option<String> },
    /// A capture against the stored authorization settled.
    CaptureSucceeded,
    CaptureFailed { reason: Option<String> },
    RefundProcessed,
    RefundFailed,
    TransferSucceeded,
}

impl GatewayWebhook {
    /// The payment reference this event is about, without the capture suffix.
    pub fn payment_reference(&self) -> &str {
        self.data
            .reference
            .strip_suffix(CAPTURE_REFERENCE_SUFFIX)
            .unwrap_or(&self.data.reference)
    }

    fn is_capture(&self) -> bool {
        self.data.reference.ends_with(CAPTURE_REFERENCE_SUFFIX)
    }

    /// Map the raw event name onto a known event, `None` for anything else.
    pub fn event(&self) -> Option<GatewayEvent> {
        match self.event.as_str() {
            "charge.success" if self.is_capture() => Some(GatewayEvent::CaptureSucceeded),
            "charge.failed" if self.is_capture() => Some(GatewayEvent::CaptureFailed {
                reason: self.data.gateway_response.clone(),
            }),
            "charge.success" => Some(GatewayEvent::ChargeSucceeded {
                authorization_code: self
                    .data
                    .authorization
                    .as_ref()
                    .map(|a| a.authorization_code.clone()),
            }),
            "charge.failed" => Some(GatewayEvent::ChargeFailed {
                reason: self.data.gateway_response.clone(),
            }),
            "refund.processed" => Some(GatewayEvent::RefundProcessed),
            "refund.failed" => Some(GatewayEvent::RefundFailed),
            "transfer.success" => Some(GatewayEvent::TransferSucceeded),
            _ => None,
        }
    }
}

impl GatewayEvent {
    /// The status `current` moves to under this event, `None` when the event does not apply.
    pub fn apply_to(&self, current: PaymentStatus) -> Option<PaymentStatus> {
        use PaymentStatus::*;
        match (self, current) {
            (GatewayEvent::ChargeSucceeded { .. }, Pending) => Some(PaymentRequested),
            (GatewayEvent::ChargeFailed { .. }, Pending) => Some(Failed),
            // a capture that timed out locally was marked failed, the gateway settles it later
            (GatewayEvent::CaptureSucceeded, PaymentRequested | Failed | Charged) => Some(Charged),
            (GatewayEvent::CaptureFailed { .. }, PaymentRequested | Failed) => Some(Failed),
            (GatewayEvent::RefundProcessed, Charged | Refunded | RefundFailed) => Some(Refunded),
            (GatewayEvent::RefundFailed, Charged | Refunded) => Some(RefundFailed),
            (GatewayEvent::TransferSucceeded, Charged) => Some(Released),
            _ => None,
        }
    }
}
