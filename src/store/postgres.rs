//! PostgreSQL record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    BookingStore, NewBooking, NotificationOutbox, NotificationQueue, PaymentDisposal, PaymentStore,
    PurchaseStore, RefundSettlement, StoreError, TripStore, WindowClaim,
};
use crate::booking::{Purchase, PurchaseStatus};
use crate::notification::{InboxQuery, NewNotification, Notification};
use crate::payment::{Payment, PaymentStatus};
use crate::trip::{find_conflicts, Trip, TripSearchQuery};

/// How long a claimed notification stays invisible to other workers.
const NOTIFICATION_LEASE_SECS: f64 = 60.0;

/// Store backed by the application's connection pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TripStore for PgStore {
    async fn insert_trip(&self, trip: &Trip) -> Result<WindowClaim, StoreError> {
        let mut tx = self.db_pool.begin().await?;
        lock_truck(&mut tx, trip.truck_id).await?;

        let existing = truck_trips(&mut tx, trip.truck_id, None).await?;
        let conflicts = find_conflicts(&existing, trip.departure_at, trip.arrival_at, None);
        if !conflicts.is_empty() {
            tx.rollback().await?;
            return Ok(WindowClaim::Conflicts(conflicts));
        }

        sqlx::query(
            r#"
            INSERT INTO trips (
                id, transporter_id, truck_id, origin_city, destination_city,
                departure_at, arrival_at, base_price, price_per_km, price_per_kg,
                is_booked, is_expired, is_listed, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(trip.id)
        .bind(trip.transporter_id)
        .bind(trip.truck_id)
        .bind(&trip.origin_city)
        .bind(&trip.destination_city)
        .bind(trip.departure_at)
        .bind(trip.arrival_at)
        .bind(trip.base_price)
        .bind(trip.price_per_km)
        .bind(trip.price_per_kg)
        .bind(trip.is_booked)
        .bind(trip.is_expired)
        .bind(trip.is_listed)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WindowClaim::Claimed)
    }

    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(trip)
    }

    async fn get_trips(&self, ids: &[Uuid]) -> Result<Vec<Trip>, StoreError> {
        let trips = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(trips)
    }

    async fn trips_by_transporter(&self, transporter_id: Uuid) -> Result<Vec<Trip>, StoreError> {
        let trips = sqlx::query_as::<_, Trip>(
            "SELECT * FROM trips WHERE transporter_id = $1 ORDER BY departure_at",
        )
        .bind(transporter_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(trips)
    }

    async fn active_trips_for_truck(
        &self,
        truck_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Trip>, StoreError> {
        let mut conn = self.db_pool.acquire().await?;
        Ok(truck_trips(&mut conn, truck_id, exclude).await?)
    }

    async fn search_trips(
        &self,
        query: &TripSearchQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trip>, StoreError> {
        let (limit, offset) = query.page_window();

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT * FROM trips WHERE is_listed AND NOT is_booked AND NOT is_expired AND departure_at > ",
        );
        query_builder.push_bind(now);

        if let Some(origin) = &query.origin_city {
            query_builder.push(" AND LOWER(origin_city) = LOWER(");
            query_builder.push_bind(origin.trim().to_string());
            query_builder.push(")");
        }
        if let Some(destination) = &query.destination_city {
            query_builder.push(" AND LOWER(destination_city) = LOWER(");
            query_builder.push_bind(destination.trim().to_string());
            query_builder.push(")");
        }
        if let Some(after) = query.departs_after {
            query_builder.push(" AND departure_at >= ");
            query_builder.push_bind(after);
        }
        if let Some(before) = query.departs_before {
            query_builder.push(" AND departure_at <= ");
            query_builder.push_bind(before);
        }

        query_builder.push(" ORDER BY departure_at LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let trips = query_builder
            .build_query_as::<Trip>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(trips)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        departure_at: DateTime<Utc>,
        arrival_at: DateTime<Utc>,
    ) -> Result<WindowClaim, StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let truck_id = sqlx::query_scalar::<_, Uuid>("SELECT truck_id FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("trip {}", id)))?;
        lock_truck(&mut tx, truck_id).await?;

        let existing = truck_trips(&mut tx, truck_id, Some(id)).await?;
        let conflicts = find_conflicts(&existing, departure_at, arrival_at, Some(id));
        if !conflicts.is_empty() {
            tx.rollback().await?;
            return Ok(WindowClaim::Conflicts(conflicts));
        }

        let result = sqlx::query(
            r#"
            UPDATE trips
            SET departure_at = $2, arrival_at = $3, updated_at = NOW()
            WHERE id = $1 AND NOT is_booked
            "#,
        )
        .bind(id)
        .bind(departure_at)
        .bind(arrival_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!("trip {} is booked", id)));
        }

        tx.commit().await?;
        Ok(WindowClaim::Claimed)
    }

    async fn mark_booked(
        &self,
        id: Uuid,
        origin_address: &str,
        destination_address: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET is_booked = TRUE, origin_address = $2, destination_address = $3, updated_at = NOW()
            WHERE id = $1 AND NOT is_booked
            "#,
        )
        .bind(id)
        .bind(origin_address)
        .bind(destination_address)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_or_booked(id).await);
        }
        Ok(())
    }

    async fn mark_unbooked(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET is_booked = FALSE, origin_address = NULL, destination_address = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("trip {}", id)));
        }
        Ok(())
    }

    async fn set_listed(&self, id: Uuid, listed: bool) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE trips SET is_listed = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(listed)
                .execute(&self.db_pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("trip {}", id)));
        }
        Ok(())
    }

    async fn delete_trip(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM trips
            WHERE id = $1
              AND NOT is_booked
              AND NOT EXISTS (SELECT 1 FROM purchases WHERE trip_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            let in_use = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT is_booked OR EXISTS (SELECT 1 FROM purchases WHERE trip_id = $1)
                FROM trips WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

            return Err(match in_use {
                Some(true) => StoreError::Conflict(format!("trip {} has bookings", id)),
                _ => StoreError::NotFound(format!("trip {}", id)),
            });
        }
        Ok(())
    }

    async fn expire_departed(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE trips
            SET is_expired = TRUE, updated_at = $1
            WHERE NOT is_booked AND NOT is_expired AND departure_at < $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ids)
    }

    async fn has_payout_account(&self, transporter_id: Uuid) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payout_accounts WHERE transporter_id = $1)",
        )
        .bind(transporter_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }
}

/// Serialize writes to one truck's schedule until the transaction ends.
async fn lock_truck(conn: &mut PgConnection, truck_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(truck_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn truck_trips(
    conn: &mut PgConnection,
    truck_id: Uuid,
    exclude: Option<Uuid>,
) -> Result<Vec<Trip>, sqlx::Error> {
    sqlx::query_as::<_, Trip>(
        r#"
        SELECT * FROM trips
        WHERE truck_id = $1
          AND NOT is_expired
          AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(truck_id)
    .bind(exclude)
    .fetch_all(conn)
    .await
}

impl PgStore {
    /// Tell a missing trip apart from a booked one after a conditional write missed.
    async fn missing_or_booked(&self, id: Uuid) -> StoreError {
        match sqlx::query_scalar::<_, bool>("SELECT is_booked FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
        {
            Ok(Some(true)) => StoreError::Conflict(format!("trip {} is booked", id)),
            Ok(_) => StoreError::NotFound(format!("trip {}", id)),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl PurchaseStore for PgStore {
    async fn get_purchase(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(purchase)
    }

    async fn active_purchase_for_trip(
        &self,
        trip_id: Uuid,
    ) -> Result<Option<Purchase>, StoreError> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE trip_id = $1 AND status NOT IN ('cancelled', 'refunded')
            "#,
        )
        .bind(trip_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(purchase)
    }

    async fn purchases_by_client(&self, client_id: Uuid) -> Result<Vec<Purchase>, StoreError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM purchases WHERE client_id = $1 ORDER BY purchased_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(purchases)
    }

    async fn purchases_by_transporter(
        &self,
        transporter_id: Uuid,
    ) -> Result<Vec<Purchase>, StoreError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT p.* FROM purchases p
            JOIN trips t ON t.id = p.trip_id
            WHERE t.transporter_id = $1
            ORDER BY p.purchased_at DESC
            "#,
        )
        .bind(transporter_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(purchases)
    }

    async fn update_purchase_status(
        &self,
        id: Uuid,
        from: PurchaseStatus,
        to: PurchaseStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE purchases SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_rating(
        &self,
        id: Uuid,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET rating = $2, comment = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'delivered'
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(comment)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn payment_for_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE purchase_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(purchase_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(payment)
    }

    async fn payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE gateway_reference = $1")
                .bind(reference)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(payment)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3,
                charged_at = CASE WHEN $3 = 'charged'::payment_status THEN NOW() ELSE charged_at END,
                refunded_at = CASE WHEN $3 = 'refunded'::payment_status THEN NOW() ELSE refunded_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_refund(
        &self,
        id: Uuid,
        from: PaymentStatus,
        refunded_amount: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'refunded', refunded_amount = $3, refunded_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(refunded_amount)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn store_authorization(&self, id: Uuid, code: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE payments SET authorization_code = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(code)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("payment {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn create_booking(&self, booking: &NewBooking) -> Result<(), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let booked = sqlx::query(
            r#"
            UPDATE trips
            SET is_booked = TRUE, origin_address = $2, destination_address = $3, updated_at = NOW()
            WHERE id = $1 AND NOT is_booked
            "#,
        )
        .bind(booking.trip_id)
        .bind(&booking.origin_address)
        .bind(&booking.destination_address)
        .execute(&mut *tx)
        .await?;

        if booked.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.missing_or_booked(booking.trip_id).await);
        }

        let p = &booking.purchase;
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, trip_id, client_id, status, purchased_at, cargo_weight_kg, distance_km,
                freight_notes, pickup_instructions, delivery_instructions,
                trip_total, service_fee, commission_amount, transporter_amount, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(p.id)
        .bind(p.trip_id)
        .bind(p.client_id)
        .bind(p.status)
        .bind(p.purchased_at)
        .bind(p.cargo_weight_kg)
        .bind(p.distance_km)
        .bind(&p.freight_notes)
        .bind(&p.pickup_instructions)
        .bind(&p.delivery_instructions)
        .bind(p.trip_total)
        .bind(p.service_fee)
        .bind(p.commission_amount)
        .bind(p.transporter_amount)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await?;

        let pay = &booking.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, purchase_id, client_id, status, total_amount, transporter_amount,
                commission_amount, service_fee, currency, customer_email,
                gateway_reference, authorization_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(pay.id)
        .bind(pay.purchase_id)
        .bind(pay.client_id)
        .bind(pay.status)
        .bind(pay.total_amount)
        .bind(pay.transporter_amount)
        .bind(pay.commission_amount)
        .bind(pay.service_fee)
        .bind(&pay.currency)
        .bind(&pay.customer_email)
        .bind(&pay.gateway_reference)
        .bind(&pay.authorization_url)
        .bind(pay.created_at)
        .bind(pay.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn dispose_booking(
        &self,
        trip_id: Uuid,
        purchase_id: Uuid,
        expected_status: PurchaseStatus,
        payment: PaymentDisposal,
    ) -> Result<(), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        match payment {
            PaymentDisposal::None => {}
            PaymentDisposal::Delete(id) => {
                sqlx::query("DELETE FROM payments WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            PaymentDisposal::Retain {
                id,
                status,
                refunded_amount,
            } => {
                sqlx::query(
                    r#"
                    UPDATE payments
                    SET status = $2,
                        refunded_amount = $3,
                        refunded_at = CASE WHEN $2 = 'refunded'::payment_status THEN NOW() ELSE refunded_at END,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(status)
                .bind(refunded_amount)
                .execute(&mut *tx)
                .await?;
            }
        }

        let deleted = sqlx::query("DELETE FROM purchases WHERE id = $1 AND status = $2")
            .bind(purchase_id)
            .bind(expected_status)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!(
                "purchase {} is no longer {}",
                purchase_id, expected_status
            )));
        }

        let unbooked = sqlx::query(
            r#"
            UPDATE trips
            SET is_booked = FALSE, origin_address = NULL, destination_address = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;

        if unbooked.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(format!("trip {}", trip_id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn settle_refund(&self, s: &RefundSettlement) -> Result<(), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE purchases SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(s.purchase_id)
        .bind(s.expected_status)
        .bind(s.new_status)
        .bind(s.settled_at)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::Conflict(format!(
                "purchase {} is no longer {}",
                s.purchase_id, s.expected_status
            )));
        }

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'refunded', refunded_amount = $2, refunded_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(s.payment_id)
        .bind(s.refunded_amount)
        .bind(s.settled_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE trips
            SET is_booked = FALSE, is_listed = FALSE,
                origin_address = NULL, destination_address = NULL, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(s.trip_id)
        .bind(s.settled_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationOutbox for PgStore {
    async fn enqueue(&self, notification: NewNotification) -> Result<Uuid, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO notifications (id, user_id, kind, message, meta)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.message)
        .bind(&notification.meta)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl NotificationQueue for PgStore {
    async fn claim_pending(&self, limit: i64) -> Result<Vec<Notification>, StoreError> {
        let claimed = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET locked_until = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id FROM notifications
                WHERE status = 'pending' AND (locked_until IS NULL OR locked_until < NOW())
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(NOTIFICATION_LEASE_SECS)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(claimed)
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'delivered', attempts = attempts + 1,
                delivered_at = NOW(), locked_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn mark_attempt_failed(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET attempts = attempts + 1,
                last_error = $2,
                locked_until = NULL,
                status = CASE WHEN attempts + 1 >= $3 THEN 'failed'::delivery_status ELSE status END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn inbox(
        &self,
        user_id: Uuid,
        query: &InboxQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(query.unread_only)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
