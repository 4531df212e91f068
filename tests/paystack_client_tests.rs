//! Contract tests for the Paystack client
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST   | `/transaction/initialize` | `initialize_*` |
//! | POST   | `/transaction/charge_authorization` | `charge_*` |
//! | POST   | `/refund` | `refund_*` |

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use freightlane_server::payment::{
    ChargeStatus, GatewayError, InitializePayment, Payment, PaymentGateway, PaymentStatus,
    PaystackClient,
};

fn test_client(mock_server: &MockServer) -> PaystackClient {
    PaystackClient::new(
        mock_server.uri(),
        "sk_test_123",
        Duration::from_secs(5),
        Some("https://app.test/payments/return".to_string()),
    )
    .unwrap()
}

fn authorized_payment() -> Payment {
    let now = Utc::now();
    Payment {
        id: Uuid::new_v4(),
        purchase_id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        status: PaymentStatus::PaymentRequested,
        total_amount: 105_000,
        transporter_amount: 90_000,
        commission_amount: 10_000,
        service_fee: 5_000,
        currency: "ZAR".to_string(),
        customer_email: "client@example.com".to_string(),
        gateway_reference: Some("FL-abc".to_string()),
        authorization_url: Some("https://checkout.paystack.com/abc".to_string()),
        authorization_code: Some("AUTH_abc".to_string()),
        refunded_amount: None,
        charged_at: None,
        refunded_at: None,
        created_at: now,
        updated_at: now,
    }
}

// ── POST /transaction/initialize ─────────────────────────────────────

#[tokio::test]
async fn initialize_sends_amount_and_returns_authorization_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_partial_json(serde_json::json!({
            "email": "client@example.com",
            "amount": 105000,
            "reference": "FL-abc",
            "currency": "ZAR",
            "callback_url": "https://app.test/payments/return"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc",
                "access_code": "abc",
                "reference": "FL-abc"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let opened = test_client(&mock_server)
        .initialize(&InitializePayment {
            email: "client@example.com".to_string(),
            amount: 105_000,
            reference: "FL-abc".to_string(),
            currency: "ZAR".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(opened.authorization_url, "https://checkout.paystack.com/abc");
    assert_eq!(opened.reference, "FL-abc");
}

#[tokio::test]
async fn initialize_surfaces_api_error_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "status": false,
            "message": "Duplicate Transaction Reference"
        })))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server)
        .initialize(&InitializePayment {
            email: "client@example.com".to_string(),
            amount: 105_000,
            reference: "FL-abc".to_string(),
            currency: "ZAR".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        GatewayError::Api {
            status, message, ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Duplicate Transaction Reference");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn initialize_rejects_status_false_on_http_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": false,
            "message": "Invalid key"
        })))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server)
        .initialize(&InitializePayment {
            email: "client@example.com".to_string(),
            amount: 1,
            reference: "FL-abc".to_string(),
            currency: "ZAR".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Api { status: 200, .. }));
}

// ── POST /transaction/charge_authorization ───────────────────────────

#[tokio::test]
async fn charge_uses_stored_authorization_and_capture_reference() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/charge_authorization"))
        .and(body_partial_json(serde_json::json!({
            "authorization_code": "AUTH_abc",
            "email": "client@example.com",
            "amount": 105000,
            "reference": "FL-abc-C"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Charge attempted",
            "data": { "status": "success", "gateway_response": "Approved" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let status = test_client(&mock_server)
        .charge(&authorized_payment())
        .await
        .unwrap();
    assert_eq!(status, ChargeStatus::Success);
}

#[tokio::test]
async fn charge_maps_declines_and_pending_states() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transaction/charge_authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Charge attempted",
            "data": { "status": "failed", "gateway_response": "Insufficient Funds" }
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/transaction/charge_authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Charge attempted",
            "data": { "status": "send_otp" }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let payment = authorized_payment();

    assert_eq!(
        client.charge(&payment).await.unwrap(),
        ChargeStatus::Failed("Insufficient Funds".to_string())
    );
    assert_eq!(client.charge(&payment).await.unwrap(), ChargeStatus::Pending);
}

#[tokio::test]
async fn charge_without_authorization_never_calls_the_gateway() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut payment = authorized_payment();
    payment.authorization_code = None;

    let err = test_client(&mock_server).charge(&payment).await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingAuthorization(id) if id == payment.id));
}

// ── POST /refund ─────────────────────────────────────────────────────

#[tokio::test]
async fn refund_sends_transaction_and_amount() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .and(body_partial_json(serde_json::json!({
            "transaction": "FL-abc",
            "amount": 100000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Refund has been queued for processing",
            "data": { "status": "pending", "amount": 100000 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let receipt = test_client(&mock_server)
        .refund("FL-abc", 100_000)
        .await
        .unwrap();
    assert!(receipt.ok);
    assert_eq!(receipt.detail, "refund pending");
}

#[tokio::test]
async fn refund_reported_failed_is_not_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": true,
            "message": "Refund processed",
            "data": { "status": "failed" }
        })))
        .mount(&mock_server)
        .await;

    let receipt = test_client(&mock_server)
        .refund("FL-abc", 100_000)
        .await
        .unwrap();
    assert!(!receipt.ok);
}

#[tokio::test]
async fn refund_with_unreadable_body_is_a_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let err = test_client(&mock_server)
        .refund("FL-abc", 100_000)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Decode { .. }));
}
