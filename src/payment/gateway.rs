//! Payment gateway port
//!
//! The booking engine only needs three gateway operations: open a payment
//! for the client to authorize, capture an authorized payment, and refund a
//! captured one. [`PaystackClient`](super::PaystackClient) is the production
//! implementation.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::Payment;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected {endpoint} ({status}): {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("gateway did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("payment {0} has no stored authorization to charge")]
    MissingAuthorization(uuid::Uuid),

    #[error("payment {0} has no gateway reference")]
    MissingReference(uuid::Uuid),

    #[error("unexpected gateway response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("gateway client misconfigured: {0}")]
    Config(String),
}

/// Input for opening a payment
#[derive(Debug, Clone, Serialize)]
pub struct InitializePayment {
    pub email: String,
    pub amount: i64,
    pub reference: String,
    pub currency: String,
}

/// Where the client goes to authorize the payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInitialization {
    pub authorization_url: String,
    pub reference: String,
}

/// Result of a capture attempt that reached the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    Success,
    /// Accepted but not settled yet; a webhook follows.
    Pending,
    Failed(String),
}

/// Result of a refund request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub ok: bool,
    pub detail: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<PaymentInitialization, GatewayError>;

    async fn charge(&self, payment: &Payment) -> Result<ChargeStatus, GatewayError>;

    async fn refund(&self, reference: &str, amount: i64) -> Result<RefundReceipt, GatewayError>;
}
