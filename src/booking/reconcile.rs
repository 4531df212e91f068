//! Gateway webhooks, checked against the booking they pay for
//!
//! A capture is only issued once a booking is confirmed. A capture event for
//! a booking that was never confirmed is refused, and one that lands after
//! the booking was thrown away is recorded and handed straight back.

use super::{BookingError, BookingService, PurchaseStatus};
use crate::payment::{
    apply_webhook, GatewayEvent, GatewayWebhook, Payment, PaymentStatus, WebhookOutcome,
};

impl BookingService {
    /// Apply a verified gateway webhook.
    pub async fn handle_webhook(
        &self,
        hook: &GatewayWebhook,
    ) -> Result<WebhookOutcome, BookingError> {
        if hook.event() != Some(GatewayEvent::CaptureSucceeded) {
            return Ok(apply_webhook(self.store.as_ref(), hook).await?);
        }

        let reference = hook.payment_reference();
        let Some(payment) = self.store.payment_by_reference(reference).await? else {
            return Ok(apply_webhook(self.store.as_ref(), hook).await?);
        };
        let purchase = self.store.get_purchase(payment.purchase_id).await?;

        match purchase.map(|p| p.status) {
            Some(PurchaseStatus::AwaitingConfirmation) => {
                tracing::error!(
                    reference,
                    purchase_id = %payment.purchase_id,
                    amount = payment.total_amount,
                    "Capture settled for a booking that was never confirmed; needs reconciling"
                );
                Ok(WebhookOutcome::Ignored {
                    reason: "booking is not confirmed".to_string(),
                })
            }
            Some(status) if !status.is_sink() => {
                Ok(apply_webhook(self.store.as_ref(), hook).await?)
            }
            _ => {
                let outcome = apply_webhook(self.store.as_ref(), hook).await?;
                match outcome {
                    WebhookOutcome::Applied {
                        to: PaymentStatus::Charged,
                        ..
                    } => Ok(self.return_stray_capture(&payment, outcome).await),
                    other => Ok(other),
                }
            }
        }
    }

    /// Refund a capture whose booking no longer exists. On failure the
    /// payment stays charged and the reference is logged for follow-up.
    async fn return_stray_capture(
        &self,
        payment: &Payment,
        recorded: WebhookOutcome,
    ) -> WebhookOutcome {
        let Some(reference) = payment.gateway_reference.as_deref() else {
            return recorded;
        };
        let amount = payment.total_amount;

        if let Err(e) = self.refund(reference, amount).await {
            tracing::error!(
                reference,
                purchase_id = %payment.purchase_id,
                amount,
                "Capture landed after its booking was cancelled and could not be refunded: {}",
                e
            );
            return recorded;
        }

        match self
            .store
            .record_refund(payment.id, PaymentStatus::Charged, amount)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    reference,
                    purchase_id = %payment.purchase_id,
                    amount,
                    "Refunded a capture that landed after its booking was cancelled"
                );
                WebhookOutcome::Applied {
                    payment_id: payment.id,
                    from: payment.status,
                    to: PaymentStatus::Refunded,
                }
            }
            Ok(false) => recorded,
            Err(e) => {
                tracing::error!(
                    reference,
                    amount,
                    "Stray capture refunded but could not be recorded: {}",
                    e
                );
                recorded
            }
        }
    }
}
