//! Payment gateway webhook

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::payment::{GatewayWebhook, WebhookOutcome};
use crate::state::AppState;

const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Apply a gateway event to the matching payment and its booking.
///
/// Fail-closed: with no secret configured every request is refused.
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookOutcome>>, ApiError> {
    match &app_state.webhook_secret {
        Some(secret) if !secret.is_empty() => {
            let provided = headers
                .get(WEBHOOK_SECRET_HEADER)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();

            if provided != secret {
                tracing::warn!("Rejected payment webhook with a bad secret");
                return Err(ApiError::Unauthorized(
                    "Unauthorized webhook request".to_string(),
                ));
            }
        }
        _ => {
            tracing::error!("Webhook secret not configured - rejecting request");
            return Err(ApiError::ServiceUnavailable(
                "Webhook endpoint is not configured".to_string(),
            ));
        }
    }

    let hook: GatewayWebhook = serde_json::from_slice(&body)?;
    let outcome = app_state.booking_service.handle_webhook(&hook).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(outcome),
        error: None,
    }))
}
