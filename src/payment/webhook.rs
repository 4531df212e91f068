//! Gateway webhook handling
//!
//! Events are matched to payments by gateway reference and applied with a
//! compare-and-set, so replays and out-of-order deliveries are harmless.

use serde::Serialize;
use uuid::Uuid;

use super::{GatewayEvent, GatewayWebhook, PaymentStatus};
use crate::store::{PaymentStore, StoreError};

/// What a webhook did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied {
        payment_id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    Ignored {
        reason: String,
    },
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

pub async fn apply_webhook<S>(store: &S, hook: &GatewayWebhook) -> Result<WebhookOutcome, StoreError>
where
    S: PaymentStore + ?Sized,
{
    let reference = hook.payment_reference();
    let Some(event) = hook.event() else {
        tracing::debug!(event = %hook.event, "Ignoring unsupported gateway event");
        return Ok(WebhookOutcome::ignored(format!("unsupported event {}", hook.event)));
    };

    let Some(payment) = store.payment_by_reference(reference).await? else {
        tracing::warn!(reference, event = %hook.event, "Webhook for unknown payment reference");
        return Ok(WebhookOutcome::ignored("unknown reference"));
    };

    if let GatewayEvent::ChargeSucceeded {
        authorization_code: Some(code),
    } = &event
    {
        if payment.authorization_code.as_deref() != Some(code.as_str()) {
            store.store_authorization(payment.id, code).await?;
        }
    }

    let next = match event.apply_to(payment.status) {
        Some(next) if next != payment.status => next,
        Some(_) => return Ok(WebhookOutcome::ignored("already applied")),
        None => {
            tracing::debug!(
                reference,
                event = %hook.event,
                status = ?payment.status,
                "Webhook does not apply to current payment status"
            );
            return Ok(WebhookOutcome::ignored(format!(
                "not applicable to {:?} payment",
                payment.status
            )));
        }
    };

    if !store
        .update_payment_status(payment.id, payment.status, next)
        .await?
    {
        return Ok(WebhookOutcome::ignored("payment changed concurrently"));
    }

    tracing::info!(
        payment_id = %payment.id,
        reference,
        from = ?payment.status,
        to = ?next,
        "Applied gateway webhook"
    );

    Ok(WebhookOutcome::Applied {
        payment_id: payment.id,
        from: payment.status,
        to: next,
    })
}
