//! Paystack HTTP client
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/transaction/initialize` | open a payment, returns the authorization url |
//! | POST   | `/transaction/charge_authorization` | capture against a stored authorization |
//! | POST   | `/refund` | refund (part of) a transaction |

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use super::gateway::{
    ChargeStatus, GatewayError, InitializePayment, PaymentGateway, PaymentInitialization,
    RefundReceipt,
};
use super::{Payment, CAPTURE_REFERENCE_SUFFIX};

/// Paystack wraps every response in `{status, message, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Serialize)]
struct ChargeAuthorizationBody<'a> {
    authorization_code: &'a str,
    email: &'a str,
    amount: i64,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    status: String,
    #[serde(default)]
    gateway_response: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    transaction: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct RefundData {
    #[serde(default)]
    status: Option<String>,
}

/// Paystack client
#[derive(Debug, Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    callback_url: Option<String>,
}

impl PaystackClient {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: &str,
        timeout: Duration,
        callback_url: Option<String>,
    ) -> Result<Self, GatewayError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let bearer = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", secret_key))
            .map_err(|_| GatewayError::Config("secret key is not a valid header value".into()))?;
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            callback_url,
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope = serde_json::from_str::<Envelope<T>>(&text);

        if !status.is_success() {
            let message = match envelope {
                Ok(env) if !env.message.is_empty() => env.message,
                _ => text,
            };
            return Err(GatewayError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.map_err(|e| GatewayError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if !envelope.status {
            return Err(GatewayError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| GatewayError::Decode {
            endpoint: endpoint.to_string(),
            message: "response has no data".to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<PaymentInitialization, GatewayError> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount,
            reference: &request.reference,
            currency: &request.currency,
            callback_url: self.callback_url.as_deref(),
        };
        let data: InitializeData = self.post("/transaction/initialize", &body).await?;

        tracing::info!(reference = %data.reference, "Gateway payment initialized");

        Ok(PaymentInitialization {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn charge(&self, payment: &Payment) -> Result<ChargeStatus, GatewayError> {
        let authorization_code = payment
            .authorization_code
            .as_deref()
            .ok_or(GatewayError::MissingAuthorization(payment.id))?;
        let reference = payment
            .gateway_reference
            .as_deref()
            .ok_or(GatewayError::MissingReference(payment.id))?;

        let body = ChargeAuthorizationBody {
            authorization_code,
            email: &payment.customer_email,
            amount: payment.total_amount,
            reference: format!("{}{}", reference, CAPTURE_REFERENCE_SUFFIX),
        };
        let data: ChargeData = self
            .post("/transaction/charge_authorization", &body)
            .await?;

        Ok(match data.status.as_str() {
            "success" => ChargeStatus::Success,
            "failed" | "abandoned" | "reversed" => ChargeStatus::Failed(
                data.gateway_response
                    .unwrap_or_else(|| format!("charge {}", data.status)),
            ),
            _ => ChargeStatus::Pending,
        })
    }

    async fn refund(&self, reference: &str, amount: i64) -> Result<RefundReceipt, GatewayError> {
        let body = RefundBody {
            transaction: reference,
            amount,
        };
        let data: RefundData = self.post("/refund", &body).await?;
        let state = data.status.unwrap_or_else(|| "pending".to_string());

        Ok(RefundReceipt {
            ok: state != "failed",
            detail: format!("refund {}", state),
        })
    }
}
