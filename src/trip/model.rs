//! Trip models and request DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A transporter-offered run between two cities on one truck.
///
/// Prices are integer minor units (cents).
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub transporter_id: Uuid,
    pub truck_id: Uuid,
    pub origin_city: String,
    pub destination_city: String,
    /// Empty until booked; cleared again on cancellation.
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub base_price: i64,
    pub price_per_km: i64,
    pub price_per_kg: i64,
    pub is_booked: bool,
    pub is_expired: bool,
    /// False after a paid booking was cancelled, until the transporter relists.
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Whether a client can book this trip at `now`.
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.is_listed && !self.is_booked && !self.is_expired && self.departure_at > now
    }

    /// Reduced view used when reporting schedule conflicts.
    pub fn summary(&self) -> TripSummary {
        TripSummary {
            id: self.id,
            origin_city: self.origin_city.clone(),
            destination_city: self.destination_city.clone(),
            departure_at: self.departure_at,
            arrival_at: self.arrival_at,
            is_booked: self.is_booked,
        }
    }
}

/// Trip fields shown next to a scheduling conflict
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TripSummary {
    pub id: Uuid,
    pub origin_city: String,
    pub destination_city: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub is_booked: bool,
}

/// Request DTO for creating a trip
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTripRequest {
    pub truck_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub origin_city: String,
    #[validate(length(min = 1, max = 120))]
    pub destination_city: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    #[validate(range(min = 0, max = 100000000000))]
    pub base_price: i64,
    #[validate(range(min = 0, max = 100000000))]
    pub price_per_km: i64,
    #[validate(range(min = 0, max = 100000000))]
    pub price_per_kg: i64,
}

/// Request DTO for moving a trip's window
#[derive(Debug, Deserialize)]
pub struct RescheduleTripRequest {
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
}

/// Query parameters for the trip search
#[derive(Debug, Default, Deserialize)]
pub struct TripSearchQuery {
    pub origin_city: Option<String>,
    pub destination_city: Option<String>,
    pub departs_after: Option<DateTime<Utc>>,
    pub departs_before: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl TripSearchQuery {
    /// Clamped `(limit, offset)` for paging.
    pub fn page_window(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (limit, (page - 1) * limit)
    }
}

/// Query parameters for the truck availability check
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub exclude_trip_id: Option<Uuid>,
}

/// `ids=a,b,c` lookup query
#[derive(Debug, Deserialize)]
pub struct TripLookupQuery {
    pub ids: String,
}

impl TripLookupQuery {
    /// Parse the comma-separated id list, skipping blanks.
    pub fn parse_ids(&self) -> Result<Vec<Uuid>, uuid::Error> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Uuid::parse_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn trip(departure_at: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            transporter_id: Uuid::new_v4(),
            truck_id: Uuid::new_v4(),
            origin_city: "Johannesburg".to_string(),
            destination_city: "Durban".to_string(),
            origin_address: None,
            destination_address: None,
            departure_at,
            arrival_at: departure_at + Duration::hours(8),
            base_price: 100_000,
            price_per_km: 0,
            price_per_kg: 0,
            is_booked: false,
            is_expired: false,
            is_listed: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_bookable_requires_listed_unbooked_future_trip() {
        let now = Utc::now();
        let mut t = trip(now + Duration::days(1));
        assert!(t.is_bookable(now));

        t.is_booked = true;
        assert!(!t.is_bookable(now));

        t.is_booked = false;
        t.is_listed = false;
        assert!(!t.is_bookable(now));

        let past = trip(now - Duration::hours(1));
        assert!(!past.is_bookable(now));
    }

    #[test]
    fn test_lookup_ids_parsing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let query = TripLookupQuery {
            ids: format!("{}, {},", a, b),
        };
        assert_eq!(query.parse_ids().unwrap(), vec![a, b]);

        let bad = TripLookupQuery {
            ids: "not-a-uuid".to_string(),
        };
        assert!(bad.parse_ids().is_err());
    }

    #[test]
    fn test_search_page_window_is_clamped() {
        let query = TripSearchQuery {
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(query.page_window(), (100, 0));

        let query = TripSearchQuery {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(query.page_window(), (10, 20));
    }
}
