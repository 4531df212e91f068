//! Status transition engine

use serde::Serialize;
use uuid::Uuid;

use super::{BookingError, BookingService, Purchase, PurchaseStatus};
use crate::notification::{NewNotification, NotificationKind};
use crate::payment::{ChargeStatus, PaymentStatus};
use crate::trip::Trip;

/// What happened to the payment when a booking was confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// The transition was not into `Booked`.
    NotAttempted,
    Captured,
    /// Accepted by the gateway; a webhook settles it.
    Pending,
    /// The booking stays confirmed and the payment is marked failed.
    Failed { reason: String },
    Skipped { reason: String },
}

/// Result of an advance request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub purchase_id: Uuid,
    pub previous: PurchaseStatus,
    pub status: PurchaseStatus,
    /// `false` when the booking was already delivered.
    pub changed: bool,
    pub capture: CaptureOutcome,
}

impl BookingService {
    /// Move a booking one step along its happy path.
    ///
    /// The new status is written before the payment is captured; a failed
    /// capture is logged and recorded on the payment but the status stands.
    pub async fn advance_status(
        &self,
        purchase_id: Uuid,
        acting_user: Uuid,
    ) -> Result<AdvanceOutcome, BookingError> {
        let _permit = self.acquire(purchase_id)?;

        let purchase = self.purchase(purchase_id).await?;
        let trip = self.trip_of(&purchase).await?;
        if trip.transporter_id != acting_user {
            return Err(BookingError::Forbidden(
                "only the trip's transporter can update this booking".to_string(),
            ));
        }

        let previous = purchase.status;
        let next = previous.advance()?;
        if next == previous {
            tracing::debug!(purchase_id = %purchase_id, "Booking already delivered");
            return Ok(AdvanceOutcome {
                purchase_id,
                previous,
                status: next,
                changed: false,
                capture: CaptureOutcome::NotAttempted,
            });
        }

        if !self
            .store
            .update_purchase_status(purchase_id, previous, next)
            .await?
        {
            return Err(BookingError::StatusConflict(purchase_id));
        }

        tracing::info!(
            purchase_id = %purchase_id,
            from = ?previous,
            to = ?next,
            "Booking status advanced"
        );

        let capture = if next == PurchaseStatus::Booked {
            self.capture_payment(purchase_id).await
        } else {
            CaptureOutcome::NotAttempted
        };

        self.notify_status_change(&purchase, &trip, next).await;

        Ok(AdvanceOutcome {
            purchase_id,
            previous,
            status: next,
            changed: true,
            capture,
        })
    }

    async fn capture_payment(&self, purchase_id: Uuid) -> CaptureOutcome {
        let payment = match self.store.payment_for_purchase(purchase_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                tracing::warn!(purchase_id = %purchase_id, "Booking confirmed without a payment record");
                return CaptureOutcome::Skipped {
                    reason: "no payment record".to_string(),
                };
            }
            Err(e) => {
                tracing::error!(purchase_id = %purchase_id, "Failed to load payment for capture: {}", e);
                return CaptureOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if payment.status != PaymentStatus::PaymentRequested {
            tracing::warn!(
                purchase_id = %purchase_id,
                payment_id = %payment.id,
                status = ?payment.status,
                "Payment not authorized, nothing to capture"
            );
            return CaptureOutcome::Skipped {
                reason: format!("payment is {:?}", payment.status),
            };
        }

        let reason = match self.with_gateway_timeout(self.gateway.charge(&payment)).await {
            Ok(ChargeStatus::Success) => {
                match self
                    .store
                    .update_payment_status(payment.id, PaymentStatus::PaymentRequested, PaymentStatus::Charged)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        payment_id = %payment.id,
                        "Payment changed while it was being captured"
                    ),
                    Err(e) => tracing::error!(
                        payment_id = %payment.id,
                        "Captured payment could not be marked charged: {}",
                        e
                    ),
                }
                tracing::info!(payment_id = %payment.id, amount = payment.total_amount, "Payment captured");
                return CaptureOutcome::Captured;
            }
            Ok(ChargeStatus::Pending) => {
                tracing::info!(payment_id = %payment.id, "Capture pending at gateway");
                return CaptureOutcome::Pending;
            }
            Ok(ChargeStatus::Failed(reason)) => reason,
            Err(e) => e.to_string(),
        };

        tracing::error!(
            purchase_id = %purchase_id,
            payment_id = %payment.id,
            "Payment capture failed, booking stays confirmed: {}",
            reason
        );
        if let Err(e) = self
            .store
            .update_payment_status(payment.id, PaymentStatus::PaymentRequested, PaymentStatus::Failed)
            .await
        {
            tracing::error!(payment_id = %payment.id, "Failed to mark payment failed: {}", e);
        }

        CaptureOutcome::Failed { reason }
    }

    async fn notify_status_change(&self, purchase: &Purchase, trip: &Trip, status: PurchaseStatus) {
        let meta = serde_json::json!({
            "purchase_id": purchase.id,
            "trip_id": trip.id,
            "status": status,
        });

        self.notifier
            .notify(
                NewNotification::new(
                    purchase.client_id,
                    NotificationKind::BookingStatusChanged,
                    format!(
                        "Your booking for {} → {} is now {}.",
                        trip.origin_city, trip.destination_city, status
                    ),
                )
                .with_meta(meta.clone()),
            )
            .await;

        if status == PurchaseStatus::Delivered {
            self.notifier
                .notify(
                    NewNotification::new(
                        purchase.client_id,
                        NotificationKind::RateTrip,
                        format!(
                            "Your freight from {} to {} was delivered. Please rate your trip.",
                            trip.origin_city, trip.destination_city
                        ),
                    )
                    .with_meta(meta),
                )
                .await;
        }
    }
}
