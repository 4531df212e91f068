//! Price breakdown for a booking

use serde::Serialize;

use crate::trip::Trip;

const BPS_DENOMINATOR: i64 = 10_000;

/// Largest amount, in minor units, any line of a quote may reach.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Fee schedule, in basis points
#[derive(Debug, Clone, Copy)]
pub struct PricingPolicy {
    /// Added on top of the trip total and paid by the client.
    pub service_fee_bps: u32,
    /// Kept by the platform out of the trip total.
    pub commission_bps: u32,
}

/// All amounts in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub trip_total: i64,
    pub service_fee: i64,
    /// What the client is charged: `trip_total + service_fee`.
    pub total_amount: i64,
    pub commission_amount: i64,
    /// Payout: `trip_total - commission_amount`.
    pub transporter_amount: i64,
}

impl PricingPolicy {
    /// Price a booking. `None` when any amount would leave `0..=MAX_AMOUNT`.
    pub fn quote(
        &self,
        trip: &Trip,
        distance_km: f64,
        cargo_weight_kg: f64,
    ) -> Option<PriceBreakdown> {
        let distance_cost = scaled_cost(trip.price_per_km, distance_km)?;
        let weight_cost = scaled_cost(trip.price_per_kg, cargo_weight_kg)?;
        let trip_total = trip
            .base_price
            .checked_add(distance_cost)?
            .checked_add(weight_cost)?;
        self.breakdown(trip_total)
    }

    pub fn breakdown(&self, trip_total: i64) -> Option<PriceBreakdown> {
        if !(0..=MAX_AMOUNT).contains(&trip_total) {
            return None;
        }
        let service_fee = apply_bps(trip_total, self.service_fee_bps)?;
        let commission_amount = apply_bps(trip_total, self.commission_bps)?;
        let total_amount = trip_total.checked_add(service_fee)?;
        if total_amount > MAX_AMOUNT {
            return None;
        }
        Some(PriceBreakdown {
            trip_total,
            service_fee,
            total_amount,
            commission_amount,
            transporter_amount: trip_total.checked_sub(commission_amount)?,
        })
    }
}

/// `rate * quantity` rounded to whole minor units, refusing non-finite or
/// out-of-range results instead of saturating.
fn scaled_cost(rate: i64, quantity: f64) -> Option<i64> {
    let cost = (rate as f64 * quantity.max(0.0)).round();
    if !cost.is_finite() || cost < 0.0 || cost > MAX_AMOUNT as f64 {
        return None;
    }
    Some(cost as i64)
}

/// `amount * bps / 10000`, rounded half-up.
fn apply_bps(amount: i64, bps: u32) -> Option<i64> {
    let scaled = amount
        .checked_mul(i64::from(bps))?
        .checked_add(BPS_DENOMINATOR / 2)?;
    Some(scaled / BPS_DENOMINATOR)
}

/// Format minor units as rands for user-facing text, e.g. `R1050.00`.
pub fn format_rands(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.abs();
    format!("{}R{}.{:02}", sign, abs / 100, abs % 100)
}
