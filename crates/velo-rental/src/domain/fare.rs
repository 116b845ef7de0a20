use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{RentalError, Result};

const MICROS_PER_MINUTE: i64 = 60_000_000;

/// Billable minutes between `start` and `end`.
///
/// Any started minute counts as a full minute. Clock skew that puts `end`
/// before `start` bills zero.
pub fn billable_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let elapsed = end.signed_duration_since(start);
    if elapsed <= chrono::Duration::zero() {
        return 0;
    }

    match elapsed.num_microseconds() {
        Some(micros) => {
            let whole = micros / MICROS_PER_MINUTE;
            if micros % MICROS_PER_MINUTE == 0 {
                whole
            } else {
                whole + 1
            }
        }
        // Spans too large for microsecond precision; sub-minute rounding is moot.
        None => elapsed.num_minutes() + 1,
    }
}

/// Exact charge for `duration_minutes` at `price_per_minute`.
///
/// Fails instead of wrapping when the product leaves the decimal range.
pub fn cost(duration_minutes: i64, price_per_minute: Decimal) -> Result<Decimal> {
    Decimal::from(duration_minutes)
        .checked_mul(price_per_minute)
        .ok_or_else(|| RentalError::InconsistentState {
            message: format!(
                "fare of {duration_minutes} minutes at {price_per_minute} per minute overflows"
            ),
        })
}

/// Duration and amount charged for a completed rental
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fare {
    pub duration_minutes: i64,
    pub cost: Decimal,
}

impl Fare {
    pub fn calculate(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        price_per_minute: Decimal,
    ) -> Result<Self> {
        let duration_minutes = billable_minutes(start, end);
        Ok(Self {
            duration_minutes,
            cost: cost(duration_minutes, price_per_minute)?,
        })
    }

    /// Fare for a rental closed without charge.
    pub fn waived(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            duration_minutes: billable_minutes(start, end),
            cost: Decimal::ZERO,
        }
    }
}
