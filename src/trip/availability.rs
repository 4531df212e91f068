//! Truck availability: interval overlap between trip windows.
//!
//! Windows are compared with inclusive bounds on both ends, so a trip that
//! departs at the exact instant another one arrives still conflicts with it.
//! Existing schedules were validated that way and the check must agree with them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Trip, TripSummary};

/// Result of an availability check for one truck
#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Unordered; callers sort for display.
    pub conflicts: Vec<TripSummary>,
}

impl Availability {
    pub fn from_conflicts(conflicts: Vec<TripSummary>) -> Self {
        Self {
            available: conflicts.is_empty(),
            conflicts,
        }
    }
}

/// Whether `[d1, a1]` and `[d2, a2]` share any instant.
///
/// Covers all four cases: the candidate starts inside, ends inside, contains,
/// or is contained by the existing window.
pub fn windows_overlap(
    existing_departure: DateTime<Utc>,
    existing_arrival: DateTime<Utc>,
    candidate_departure: DateTime<Utc>,
    candidate_arrival: DateTime<Utc>,
) -> bool {
    !(candidate_arrival < existing_departure || candidate_departure > existing_arrival)
}

/// Filter `existing` down to the trips that collide with the candidate window.
///
/// Expired trips and `exclude_trip_id` never conflict.
pub fn find_conflicts<'a, I>(
    existing: I,
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
    exclude_trip_id: Option<Uuid>,
) -> Vec<TripSummary>
where
    I: IntoIterator<Item = &'a Trip>,
{
    existing
        .into_iter()
        .filter(|trip| !trip.is_expired)
        .filter(|trip| Some(trip.id) != exclude_trip_id)
        .filter(|trip| windows_overlap(trip.departure_at, trip.arrival_at, departure, arrival))
        .map(Trip::summary)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn trip(departure_at: DateTime<Utc>, arrival_at: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            transporter_id: Uuid::new_v4(),
            truck_id: Uuid::new_v4(),
            origin_city: "Cape Town".to_string(),
            destination_city: "George".to_string(),
            origin_address: None,
            destination_address: None,
            departure_at,
            arrival_at,
            base_price: 50_000,
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
    fn test_candidate_ending_inside_existing_conflicts() {
        // 08:00-18:00 existing, 17:00-20:00 candidate
        let existing = trip(at(8), at(18));
        let conflicts = find_conflicts([&existing], at(17), at(20), None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, existing.id);
    }

    #[test]
    fn test_all_overlap_shapes_conflict() {
        let (d1, a1) = (at(8), at(18));
        // starts inside
        assert!(windows_overlap(d1, a1, at(10), at(20)));
        // ends inside
        assert!(windows_overlap(d1, a1, at(6), at(9)));
        // contains existing
        assert!(windows_overlap(d1, a1, at(7), at(19)));
        // contained by existing
        assert!(windows_overlap(d1, a1, at(9), at(10)));
    }

    #[test]
    fn test_touching_boundaries_conflict() {
        let (d1, a1) = (at(8), at(18));
        assert!(windows_overlap(d1, a1, at(18), at(20)));
        assert!(windows_overlap(d1, a1, at(4), at(8)));
    }

    #[test]
    fn test_disjoint_windows_do_not_conflict() {
        let (d1, a1) = (at(8), at(18));
        assert!(!windows_overlap(d1, a1, at(18) + Duration::seconds(1), at(22)));
        assert!(!windows_overlap(d1, a1, at(2), at(8) - Duration::seconds(1)));
    }

    #[test]
    fn test_expired_trips_never_conflict() {
        let mut existing = trip(at(8), at(18));
        existing.is_expired = true;
        let availability =
            Availability::from_conflicts(find_conflicts([&existing], at(9), at(10), None));
        assert!(availability.available);
        assert!(availability.conflicts.is_empty());
    }

    #[test]
    fn test_excluded_trip_is_ignored_when_editing() {
        let existing = trip(at(8), at(18));
        let conflicts = find_conflicts([&existing], at(9), at(19), Some(existing.id));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_booked_trips_still_conflict() {
        let mut existing = trip(at(8), at(18));
        existing.is_booked = true;
        let availability =
            Availability::from_conflicts(find_conflicts([&existing], at(12), at(13), None));
        assert!(!availability.available);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    /// `(departure, arrival)` as minute offsets within a fortnight.
    fn window() -> impl Strategy<Value = (i64, i64)> {
        (0i64..20_160, 0i64..2_880).prop_map(|(start, len)| (start, start + len))
    }

    fn instant(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn trip((d, a): (i64, i64), is_expired: bool) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            transporter_id: Uuid::nil(),
            truck_id: Uuid::nil(),
            origin_city: "Kimberley".to_string(),
            destination_city: "Upington".to_string(),
            origin_address: None,
            destination_address: None,
            departure_at: instant(d),
            arrival_at: instant(a),
            base_price: 10_000,
            price_per_km: 0,
            price_per_kg: 0,
            is_booked: false,
            is_expired,
            is_listed: true,
            created_at: instant(0),
            updated_at: instant(0),
        }
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(x in window(), y in window()) {
            prop_assert_eq!(
                windows_overlap(instant(x.0), instant(x.1), instant(y.0), instant(y.1)),
                windows_overlap(instant(y.0), instant(y.1), instant(x.0), instant(x.1))
            );
        }

        /// Closed intervals meet iff the later start is no later than the earlier end.
        #[test]
        fn overlap_matches_interval_intersection(x in window(), y in window()) {
            let meets = x.0.max(y.0) <= x.1.min(y.1);
            prop_assert_eq!(
                windows_overlap(instant(x.0), instant(x.1), instant(y.0), instant(y.1)),
                meets
            );
        }

        #[test]
        fn back_to_back_windows_conflict(x in window(), len in 0i64..600) {
            prop_assert!(windows_overlap(
                instant(x.0),
                instant(x.1),
                instant(x.1),
                instant(x.1 + len)
            ));
        }

        /// Exactly the live, non-excluded trips whose windows meet the candidate are reported.
        #[test]
        fn conflicts_are_the_overlapping_live_trips(
            existing in prop::collection::vec((window(), any::<bool>()), 0..12),
            candidate in window(),
            exclude_first in any::<bool>(),
        ) {
            let trips: Vec<Trip> = existing.iter().map(|(w, expired)| trip(*w, *expired)).collect();
            let exclude = if exclude_first { trips.first().map(|t| t.id) } else { None };
            let (from, to) = (instant(candidate.0), instant(candidate.1));

            let found: Vec<Uuid> = find_conflicts(&trips, from, to, exclude)
                .into_iter()
                .map(|s| s.id)
                .collect();
            let expected: Vec<Uuid> = trips
                .iter()
                .filter(|t| !t.is_expired && Some(t.id) != exclude)
                .filter(|t| t.departure_at.max(from) <= t.arrival_at.min(to))
                .map(|t| t.id)
                .collect();

            prop_assert_eq!(found, expected);
        }
    }
}
