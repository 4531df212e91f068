//! Cancellation / refund orchestrator
//!
//! Decision table, by stored status and payment status:
//!
//! | status               | payment                          | action                             |
//! |----------------------|----------------------------------|------------------------------------|
//! | AwaitingConfirmation | none, pending, requested, failed | discard the booking                |
//! | AwaitingConfirmation | charged                          | refund in full, then settle        |
//! | Booked               | none, pending                    | discard the booking                |
//! | Booked               | requested, failed                | void: discard, keep payment failed |
//! | Booked               | charged                          | refund, then settle                |
//! | either               | anything else                    | `InvalidStateForCancellation`      |
//!
//! Once a booking is confirmed a capture may still be settling at the
//! gateway, so its payment is kept rather than deleted; a capture that lands
//! later is matched by reference and refunded.
//!
//! When a refund is needed it is issued and confirmed before any local record
//! changes. A refund that fails or does not answer in time aborts the whole
//! cancellation.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::{format_rands, BookingError, BookingService, Purchase, PurchaseStatus};
use crate::notification::{NewNotification, NotificationKind};
use crate::payment::{Payment, PaymentStatus, RefundReceipt};
use crate::store::{PaymentDisposal, RefundSettlement, StoreError};
use crate::trip::Trip;

/// Which side of the booking is acting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Transporter,
    Client,
}

impl Actor {
    fn resolve(user_id: Uuid, trip: &Trip, purchase: &Purchase) -> Option<Actor> {
        if user_id == trip.transporter_id {
            Some(Actor::Transporter)
        } else if user_id == purchase.client_id {
            Some(Actor::Client)
        } else {
            None
        }
    }
}

/// What a cancellation will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationPlan {
    /// Status is past the point where cancellation applies.
    NoOp,
    /// Nothing was charged: delete the payment and purchase, unbook the trip.
    Discard,
    /// A capture was issued but never settled: delete the purchase, unbook
    /// the trip, keep the payment marked failed.
    Void,
    /// Refund `amount`, then move the purchase into `sink`.
    Refund { amount: i64, sink: PurchaseStatus },
}

/// Evaluate the cancellation decision table.
pub fn plan_cancellation(
    purchase: &Purchase,
    payment: Option<&Payment>,
    actor: Actor,
) -> Result<CancellationPlan, BookingError> {
    use PaymentStatus as P;

    let status = payment.map(|p| p.status);
    let charged_total = payment.map_or(0, |p| p.total_amount);
    let sink = match actor {
        Actor::Transporter => PurchaseStatus::Refunded,
        Actor::Client => PurchaseStatus::Cancelled,
    };

    match purchase.status {
        PurchaseStatus::AwaitingConfirmation => match status {
            None | Some(P::Pending | P::PaymentRequested | P::Failed) => Ok(CancellationPlan::Discard),
            // captured before the transporter confirmed; the fee is not kept
            Some(P::Charged) => Ok(CancellationPlan::Refund {
                amount: charged_total,
                sink,
            }),
            Some(other) => Err(settled_payment(other)),
        },
        PurchaseStatus::Booked => match status {
            None | Some(P::Pending) => Ok(CancellationPlan::Discard),
            Some(P::PaymentRequested | P::Failed) => Ok(CancellationPlan::Void),
            Some(P::Charged) => Ok(CancellationPlan::Refund {
                amount: match actor {
                    Actor::Transporter => charged_total,
                    Actor::Client => purchase.trip_total,
                },
                sink,
            }),
            Some(other) => Err(settled_payment(other)),
        },
        PurchaseStatus::Dispatched
        | PurchaseStatus::Delivered
        | PurchaseStatus::Cancelled
        | PurchaseStatus::Refunded => Ok(CancellationPlan::NoOp),
    }
}

fn settled_payment(status: PaymentStatus) -> BookingError {
    BookingError::InvalidStateForCancellation(format!("payment is already {:?}", status))
}

/// Confirmation text shown before anything irreversible happens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationNotice {
    pub trip_id: Uuid,
    pub purchase_id: Uuid,
    pub actor: Actor,
    pub status: PurchaseStatus,
    /// Set when the booking is charged and a refund will be issued.
    pub refund_amount: Option<i64>,
    /// The client's service fee when a client cancellation forfeits it.
    pub forfeited_fee: Option<i64>,
    pub message: String,
}

/// Result of a cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancellationOutcome {
    NoOp {
        status: PurchaseStatus,
    },
    Discarded {
        trip_id: Uuid,
        purchase_id: Uuid,
        payment_deleted: bool,
    },
    Refunded {
        trip_id: Uuid,
        purchase_id: Uuid,
        status: PurchaseStatus,
        refund_amount: i64,
        gateway_detail: String,
    },
}

/// What happened to the payment of a rejected booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDisposition {
    NoPayment,
    Deleted,
    Retained { status: PaymentStatus },
}

/// Result of a rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionOutcome {
    pub trip_id: Uuid,
    pub purchase_id: Uuid,
    pub payment: PaymentDisposition,
    pub refund_amount: Option<i64>,
}

impl BookingService {
    /// The confirmation text for `acting_user` cancelling the booking on `trip_id`.
    pub async fn cancellation_notice(
        &self,
        trip_id: Uuid,
        acting_user: Uuid,
    ) -> Result<CancellationNotice, BookingError> {
        let (trip, purchase, actor) = self.resolve_cancellation(trip_id, acting_user).await?;
        let payment = self.store.payment_for_purchase(purchase.id).await?;
        Ok(cancellation_notice(&trip, &purchase, payment.as_ref(), actor))
    }

    /// Cancel the active booking on a trip.
    ///
    /// `current_status` is the status the caller saw. Statuses past `Booked`
    /// make this a no-op; a stale view is refused.
    pub async fn cancel(
        &self,
        trip_id: Uuid,
        current_status: PurchaseStatus,
        acting_user: Uuid,
        confirmed: bool,
    ) -> Result<CancellationOutcome, BookingError> {
        if !current_status.is_cancellable() {
            return Ok(CancellationOutcome::NoOp {
                status: current_status,
            });
        }

        let (trip, purchase, actor) = self.resolve_cancellation(trip_id, acting_user).await?;
        let payment = self.store.payment_for_purchase(purchase.id).await?;

        if !confirmed {
            return Err(BookingError::ConfirmationRequired(Box::new(
                cancellation_notice(&trip, &purchase, payment.as_ref(), actor),
            )));
        }

        let _permit = self.acquire(purchase.id)?;

        // re-read under the guard
        let purchase = self.purchase(purchase.id).await?;
        if purchase.status != current_status {
            return Err(BookingError::InvalidStateForCancellation(format!(
                "booking is {}, not {}",
                purchase.status, current_status
            )));
        }
        let payment = self.store.payment_for_purchase(purchase.id).await?;

        match plan_cancellation(&purchase, payment.as_ref(), actor)? {
            CancellationPlan::NoOp => Ok(CancellationOutcome::NoOp {
                status: purchase.status,
            }),
            plan @ (CancellationPlan::Discard | CancellationPlan::Void) => {
                let disposal = match (&payment, plan) {
                    (None, _) => PaymentDisposal::None,
                    (Some(p), CancellationPlan::Void) => PaymentDisposal::Retain {
                        id: p.id,
                        status: PaymentStatus::Failed,
                        refunded_amount: None,
                    },
                    (Some(p), _) => PaymentDisposal::Delete(p.id),
                };
                self.dispose(&trip, &purchase, disposal).await?;

                tracing::info!(
                    trip_id = %trip.id,
                    purchase_id = %purchase.id,
                    actor = ?actor,
                    payment = ?disposal,
                    "Uncharged booking cancelled"
                );

                let message = format!(
                    "The booking for {} → {} was cancelled by the {}.",
                    trip.origin_city,
                    trip.destination_city,
                    actor_label(actor)
                );
                let meta = serde_json::json!({ "trip_id": trip.id, "purchase_id": purchase.id });
                for user_id in [purchase.client_id, trip.transporter_id] {
                    self.notifier
                        .notify(
                            NewNotification::new(user_id, NotificationKind::BookingCancelled, &message)
                                .with_meta(meta.clone()),
                        )
                        .await;
                }

                Ok(CancellationOutcome::Discarded {
                    trip_id: trip.id,
                    purchase_id: purchase.id,
                    payment_deleted: matches!(disposal, PaymentDisposal::Delete(_)),
                })
            }
            CancellationPlan::Refund { amount, sink } => {
                let Some(payment) = payment else {
                    return Err(BookingError::InvalidStateForCancellation(
                        "charged booking has no payment record".to_string(),
                    ));
                };
                let reference = payment.gateway_reference.clone().ok_or_else(|| {
                    BookingError::InvalidStateForCancellation(
                        "charged payment has no gateway reference".to_string(),
                    )
                })?;

                let receipt = self.refund(&reference, amount).await?;

                let settlement = RefundSettlement {
                    trip_id: trip.id,
                    purchase_id: purchase.id,
                    expected_status: purchase.status,
                    new_status: sink,
                    payment_id: payment.id,
                    refunded_amount: amount,
                    settled_at: Utc::now(),
                };
                if let Err(source) = self.store.settle_refund(&settlement).await {
                    tracing::error!(
                        trip_id = %trip.id,
                        purchase_id = %purchase.id,
                        reference = %reference,
                        amount,
                        "Refund issued but settlement failed: {}",
                        source
                    );
                    return Err(BookingError::SettlementFailed {
                        reference,
                        reason: source.to_string(),
                    });
                }

                tracing::info!(
                    trip_id = %trip.id,
                    purchase_id = %purchase.id,
                    actor = ?actor,
                    amount,
                    status = ?sink,
                    "Charged booking cancelled and refunded"
                );

                let meta = serde_json::json!({
                    "trip_id": trip.id,
                    "purchase_id": purchase.id,
                    "refund_amount": amount,
                });
                self.notifier
                    .notify(
                        NewNotification::new(
                            purchase.client_id,
                            NotificationKind::RefundInitiated,
                            format!(
                                "Your booking for {} → {} was cancelled. A refund of {} is on its way.",
                                trip.origin_city,
                                trip.destination_city,
                                format_rands(amount)
                            ),
                        )
                        .with_meta(meta.clone()),
                    )
                    .await;
                self.notifier
                    .notify(
                        NewNotification::new(
                            trip.transporter_id,
                            NotificationKind::TripNotRelisted,
                            format!(
                                "The booking for {} → {} was cancelled and refunded. \
                                 The trip was not relisted; relist it if you still want to offer it.",
                                trip.origin_city, trip.destination_city
                            ),
                        )
                        .with_meta(meta),
                    )
                    .await;

                Ok(CancellationOutcome::Refunded {
                    trip_id: trip.id,
                    purchase_id: purchase.id,
                    status: sink,
                    refund_amount: amount,
                    gateway_detail: receipt.detail,
                })
            }
        }
    }

    /// A transporter declines a booking that is still awaiting confirmation.
    pub async fn reject(
        &self,
        purchase_id: Uuid,
        acting_user: Uuid,
        confirmed: bool,
    ) -> Result<RejectionOutcome, BookingError> {
        let purchase = self.purchase(purchase_id).await?;
        let trip = self.trip_of(&purchase).await?;
        if trip.transporter_id != acting_user {
            return Err(BookingError::Forbidden(
                "only the trip's transporter can reject this booking".to_string(),
            ));
        }
        ensure_rejectable(&purchase)?;

        if !confirmed {
            let payment = self.store.payment_for_purchase(purchase_id).await?;
            return Err(BookingError::ConfirmationRequired(Box::new(
                rejection_notice(&trip, &purchase, payment.as_ref()),
            )));
        }

        let _permit = self.acquire(purchase_id)?;

        let purchase = self.purchase(purchase_id).await?;
        ensure_rejectable(&purchase)?;
        let payment = self.store.payment_for_purchase(purchase_id).await?;

        let (disposal, disposition, refund_amount) = match &payment {
            None => (PaymentDisposal::None, PaymentDisposition::NoPayment, None),
            Some(p) => match &p.gateway_reference {
                None => (PaymentDisposal::Delete(p.id), PaymentDisposition::Deleted, None),
                Some(reference) if p.status == PaymentStatus::Charged => {
                    self.refund(reference, p.total_amount).await?;
                    (
                        PaymentDisposal::Retain {
                            id: p.id,
                            status: PaymentStatus::Refunded,
                            refunded_amount: Some(p.total_amount),
                        },
                        PaymentDisposition::Retained {
                            status: PaymentStatus::Refunded,
                        },
                        Some(p.total_amount),
                    )
                }
                Some(_) => (
                    PaymentDisposal::Retain {
                        id: p.id,
                        status: PaymentStatus::Failed,
                        refunded_amount: None,
                    },
                    PaymentDisposition::Retained {
                        status: PaymentStatus::Failed,
                    },
                    None,
                ),
            },
        };

        if let Err(e) = self.dispose(&trip, &purchase, disposal).await {
            let reference = payment.as_ref().and_then(|p| p.gateway_reference.clone());
            if let Some((amount, reference)) = refund_amount.zip(reference) {
                tracing::error!(
                    purchase_id = %purchase_id,
                    reference = %reference,
                    amount,
                    "Refund issued but rejection could not be recorded: {}",
                    e
                );
                return Err(BookingError::SettlementFailed {
                    reference,
                    reason: e.to_string(),
                });
            }
            return Err(e);
        }

        tracing::info!(
            trip_id = %trip.id,
            purchase_id = %purchase_id,
            payment = ?disposition,
            "Booking rejected"
        );

        let mut message = format!(
            "Your booking for {} → {} was declined by the transporter.",
            trip.origin_city, trip.destination_city
        );
        if let Some(amount) = refund_amount {
            message.push_str(&format!(" A refund of {} is on its way.", format_rands(amount)));
        }
        self.notifier
            .notify(
                NewNotification::new(purchase.client_id, NotificationKind::BookingRejected, message)
                    .with_meta(serde_json::json!({
                        "trip_id": trip.id,
                        "purchase_id": purchase_id,
                    })),
            )
            .await;

        Ok(RejectionOutcome {
            trip_id: trip.id,
            purchase_id,
            payment: disposition,
            refund_amount,
        })
    }

    async fn resolve_cancellation(
        &self,
        trip_id: Uuid,
        acting_user: Uuid,
    ) -> Result<(Trip, Purchase, Actor), BookingError> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::RecordNotFound(format!("trip {} not found", trip_id)))?;
        let purchase = self
            .store
            .active_purchase_for_trip(trip_id)
            .await?
            .ok_or_else(|| {
                BookingError::RecordNotFound(format!("trip {} has no active booking", trip_id))
            })?;
        let actor = Actor::resolve(acting_user, &trip, &purchase).ok_or_else(|| {
            BookingError::Forbidden("only the transporter or the booking client can cancel".to_string())
        })?;
        Ok((trip, purchase, actor))
    }

    pub(super) async fn refund(
        &self,
        reference: &str,
        amount: i64,
    ) -> Result<RefundReceipt, BookingError> {
        let receipt = self
            .with_gateway_timeout(self.gateway.refund(reference, amount))
            .await
            .map_err(|e| {
                tracing::warn!(reference, amount, "Refund failed, nothing changed: {}", e);
                BookingError::RefundGatewayFailure(e.to_string())
            })?;

        if !receipt.ok {
            tracing::warn!(reference, amount, detail = %receipt.detail, "Refund declined, nothing changed");
            return Err(BookingError::RefundGatewayFailure(receipt.detail));
        }
        Ok(receipt)
    }

    async fn dispose(
        &self,
        trip: &Trip,
        purchase: &Purchase,
        disposal: PaymentDisposal,
    ) -> Result<(), BookingError> {
        match self
            .store
            .dispose_booking(trip.id, purchase.id, purchase.status, disposal)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => Err(BookingError::StatusConflict(purchase.id)),
            Err(StoreError::NotFound(what)) => Err(BookingError::RecordNotFound(what)),
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_rejectable(purchase: &Purchase) -> Result<(), BookingError> {
    if purchase.status != PurchaseStatus::AwaitingConfirmation {
        return Err(BookingError::InvalidStateForCancellation(format!(
            "only bookings awaiting confirmation can be rejected, this one is {}",
            purchase.status
        )));
    }
    Ok(())
}

fn actor_label(actor: Actor) -> &'static str {
    match actor {
        Actor::Transporter => "transporter",
        Actor::Client => "client",
    }
}

/// Build the confirmation text for a cancellation.
pub(super) fn cancellation_notice(
    trip: &Trip,
    purchase: &Purchase,
    payment: Option<&Payment>,
    actor: Actor,
) -> CancellationNotice {
    let plan = plan_cancellation(purchase, payment, actor).unwrap_or(CancellationPlan::NoOp);

    let (refund_amount, forfeited_fee, message) = match (plan, actor) {
        (CancellationPlan::Refund { amount, .. }, Actor::Client)
            if purchase.status == PurchaseStatus::Booked =>
        {
            (
                Some(amount),
                Some(purchase.service_fee),
                format!(
                    "Cancelling this booking refunds {}. The service fee of {} is non-refundable.",
                    format_rands(amount),
                    format_rands(purchase.service_fee)
                ),
            )
        }
        (CancellationPlan::Refund { amount, .. }, Actor::Client) => (
            Some(amount),
            None,
            format!(
                "The transporter has not confirmed yet, so cancelling refunds the {} you paid in full.",
                format_rands(amount)
            ),
        ),
        (CancellationPlan::Refund { amount, .. }, Actor::Transporter) => (
            Some(amount),
            None,
            format!(
                "Cancelling this booking refunds the client in full ({}). \
                 The trip will not be relisted automatically.",
                format_rands(amount)
            ),
        ),
        (CancellationPlan::Void, Actor::Client) => (
            None,
            None,
            "Your payment for this booking has not gone through, so cancelling it costs you nothing. \
             If the charge still settles it is refunded in full."
                .to_string(),
        ),
        (_, Actor::Client) => (
            None,
            None,
            "Nothing has been charged for this booking yet, so cancelling it costs you nothing."
                .to_string(),
        ),
        (_, Actor::Transporter) => (
            None,
            None,
            "The client has not been charged yet. Cancelling releases the trip for new bookings."
                .to_string(),
        ),
    };

    CancellationNotice {
        trip_id: trip.id,
        purchase_id: purchase.id,
        actor,
        status: purchase.status,
        refund_amount,
        forfeited_fee,
        message,
    }
}

fn rejection_notice(trip: &Trip, purchase: &Purchase, payment: Option<&Payment>) -> CancellationNotice {
    let refund_amount = payment
        .filter(|p| p.status == PaymentStatus::Charged && p.gateway_reference.is_some())
        .map(|p| p.total_amount);

    let message = match refund_amount {
        Some(amount) => format!(
            "Rejecting this booking refunds the client {} and releases the trip for new bookings.",
            format_rands(amount)
        ),
        None => "Rejecting this booking releases the trip for new bookings.".to_string(),
    };

    CancellationNotice {
        trip_id: trip.id,
        purchase_id: purchase.id,
        actor: Actor::Transporter,
        status: purchase.status,
        refund_amount,
        forfeited_fee: None,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn purchase(status: PurchaseStatus) -> Purchase {
        let now = Utc::now();
        Purchase {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            status,
            purchased_at: now,
            cargo_weight_kg: 500.0,
            distance_km: 120.0,
            freight_notes: None,
            pickup_instructions: None,
            delivery_instructions: None,
            trip_total: 100_000,
            service_fee: 5_000,
            commission_amount: 10_000,
            transporter_amount: 90_000,
            rating: None,
            comment: None,
            updated_at: now,
        }
    }

    fn payment(purchase: &Purchase, status: PaymentStatus) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            purchase_id: purchase.id,
            client_id: purchase.client_id,
            status,
            total_amount: 105_000,
            transporter_amount: 90_000,
            commission_amount: 10_000,
            service_fee: 5_000,
            currency: "ZAR".to_string(),
            customer_email: "client@example.com".to_string(),
            gateway_reference: Some("FL-test".to_string()),
            authorization_url: None,
            authorization_code: Some("AUTH_x".to_string()),
            refunded_amount: None,
            charged_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn trip(purchase: &Purchase) -> Trip {
        let now = Utc::now();
        Trip {
            id: purchase.trip_id,
            transporter_id: Uuid::new_v4(),
            truck_id: Uuid::new_v4(),
            origin_city: "Johannesburg".to_string(),
            destination_city: "Durban".to_string(),
            origin_address: None,
            destination_address: None,
            departure_at: now + Duration::days(1),
            arrival_at: now + Duration::days(1) + Duration::hours(8),
            base_price: 100_000,
            price_per_km: 0,
            price_per_kg: 0,
            is_booked: true,
            is_expired: false,
            is_listed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_awaiting_confirmation_uncharged_is_discarded() {
        let p = purchase(PurchaseStatus::AwaitingConfirmation);
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::PaymentRequested,
            PaymentStatus::Failed,
        ] {
            let pay = payment(&p, status);
            assert_eq!(
                plan_cancellation(&p, Some(&pay), Actor::Client).unwrap(),
                CancellationPlan::Discard
            );
        }
        assert_eq!(
            plan_cancellation(&p, None, Actor::Transporter).unwrap(),
            CancellationPlan::Discard
        );
    }

    #[test]
    fn test_early_capture_is_refunded_in_full_by_either_side() {
        let p = purchase(PurchaseStatus::AwaitingConfirmation);
        let pay = payment(&p, PaymentStatus::Charged);

        assert_eq!(
            plan_cancellation(&p, Some(&pay), Actor::Client).unwrap(),
            CancellationPlan::Refund {
                amount: 105_000,
                sink: PurchaseStatus::Cancelled
            }
        );
        assert_eq!(
            plan_cancellation(&p, Some(&pay), Actor::Transporter).unwrap(),
            CancellationPlan::Refund {
                amount: 105_000,
                sink: PurchaseStatus::Refunded
            }
        );
    }

    #[test]
    fn test_booked_without_authorization_is_discarded() {
        let p = purchase(PurchaseStatus::Booked);
        let pay = payment(&p, PaymentStatus::Pending);
        assert_eq!(
            plan_cancellation(&p, Some(&pay), Actor::Transporter).unwrap(),
            CancellationPlan::Discard
        );
        assert_eq!(
            plan_cancellation(&p, None, Actor::Client).unwrap(),
            CancellationPlan::Discard
        );
    }

    #[test]
    fn test_booked_with_unsettled_capture_keeps_the_payment() {
        let p = purchase(PurchaseStatus::Booked);
        for status in [PaymentStatus::PaymentRequested, PaymentStatus::Failed] {
            let pay = payment(&p, status);
            assert_eq!(
                plan_cancellation(&p, Some(&pay), Actor::Client).unwrap(),
                CancellationPlan::Void
            );
        }
    }

    #[test]
    fn test_charged_refund_depends_on_actor() {
        let p = purchase(PurchaseStatus::Booked);
        let pay = payment(&p, PaymentStatus::Charged);

        assert_eq!(
            plan_cancellation(&p, Some(&pay), Actor::Transporter).unwrap(),
            CancellationPlan::Refund {
                amount: 105_000,
                sink: PurchaseStatus::Refunded
            }
        );
        assert_eq!(
            plan_cancellation(&p, Some(&pay), Actor::Client).unwrap(),
            CancellationPlan::Refund {
                amount: 100_000,
                sink: PurchaseStatus::Cancelled
            }
        );
    }

    #[test]
    fn test_post_charge_payment_states_are_refused() {
        let p = purchase(PurchaseStatus::Booked);
        for status in [
            PaymentStatus::Released,
            PaymentStatus::Refunded,
            PaymentStatus::RefundFailed,
            PaymentStatus::Forfeited,
        ] {
            let pay = payment(&p, status);
            assert!(matches!(
                plan_cancellation(&p, Some(&pay), Actor::Client),
                Err(BookingError::InvalidStateForCancellation(_))
            ));
        }
    }

    #[test]
    fn test_later_statuses_are_no_ops() {
        for status in [
            PurchaseStatus::Dispatched,
            PurchaseStatus::Delivered,
            PurchaseStatus::Cancelled,
            PurchaseStatus::Refunded,
        ] {
            let p = purchase(status);
            assert_eq!(
                plan_cancellation(&p, None, Actor::Client).unwrap(),
                CancellationPlan::NoOp
            );
        }
    }

    #[test]
    fn test_client_notice_discloses_forfeited_fee() {
        let p = purchase(PurchaseStatus::Booked);
        let pay = payment(&p, PaymentStatus::Charged);
        let notice = cancellation_notice(&trip(&p), &p, Some(&pay), Actor::Client);

        assert_eq!(notice.refund_amount, Some(100_000));
        assert_eq!(notice.forfeited_fee, Some(5_000));
        assert_eq!(
            notice.message,
            "Cancelling this booking refunds R1000.00. The service fee of R50.00 is non-refundable."
        );
    }

    #[test]
    fn test_transporter_notice_mentions_relisting() {
        let p = purchase(PurchaseStatus::Booked);
        let pay = payment(&p, PaymentStatus::Charged);
        let notice = cancellation_notice(&trip(&p), &p, Some(&pay), Actor::Transporter);

        assert_eq!(notice.refund_amount, Some(105_000));
        assert!(notice.message.contains("R1050.00"));
        assert!(notice.message.contains("not be relisted"));
    }

    #[test]
    fn test_early_capture_notice_keeps_no_fee() {
        let p = purchase(PurchaseStatus::AwaitingConfirmation);
        let pay = payment(&p, PaymentStatus::Charged);
        let notice = cancellation_notice(&trip(&p), &p, Some(&pay), Actor::Client);

        assert_eq!(notice.refund_amount, Some(105_000));
        assert_eq!(notice.forfeited_fee, None);
        assert!(notice.message.contains("R1050.00"));
    }

    #[test]
    fn test_void_notice_promises_a_refund_if_the_charge_lands() {
        let p = purchase(PurchaseStatus::Booked);
        let pay = payment(&p, PaymentStatus::Failed);
        let notice = cancellation_notice(&trip(&p), &p, Some(&pay), Actor::Client);

        assert_eq!(notice.refund_amount, None);
        assert!(notice.message.contains("refunded in full"));
    }

    #[test]
    fn test_notice_before_capture_promises_no_charge() {
        let p = purchase(PurchaseStatus::AwaitingConfirmation);
        let notice = cancellation_notice(&trip(&p), &p, None, Actor::Client);
        assert_eq!(notice.refund_amount, None);
        assert!(notice.message.contains("Nothing has been charged"));
    }
}
