//! Payment domain module
//!
//! Payment records, the gateway port with its Paystack client, and webhook
//! handling.

mod gateway;
mod model;
mod paystack;
mod webhook;

pub use gateway::{
    ChargeStatus, GatewayError, InitializePayment, PaymentGateway, PaymentInitialization,
    RefundReceipt,
};
pub use model::*;
pub use paystack::PaystackClient;
pub use webhook::{apply_webhook, WebhookOutcome};

use uuid::Uuid;

/// Gateway reference for the payment of `purchase_id`.
pub fn payment_reference(purchase_id: Uuid) -> String {
    format!("FL-{}", purchase_id.simple())
}
