//! Next payout projection
//!
//! The pool pays out once the unpaid balance reaches the wallet's minimum
//! payout threshold. Given the current balance and the pool-reported earn
//! rate, this projects when that happens and what the balance will be then.
//!
//! All arithmetic is done against a single UTC "now"; local time only enters
//! at display time via [`PayoutEstimate::next_payout_local`].

use crate::models::{DATE_FORMAT, PAYOUT_DP};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutEstimate {
    /// Minutes until the threshold is reached (0 when no estimate is possible)
    pub minutes_to_threshold: Decimal,
    pub next_payout: DateTime<Utc>,
    /// Projected unpaid balance at `next_payout` (5 decimals)
    pub unpaid_at_payout: Decimal,
}

impl PayoutEstimate {
    pub fn next_payout_local(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.next_payout.with_timezone(&offset)
    }

    pub fn next_payout_display(&self, offset: FixedOffset) -> String {
        self.next_payout_local(offset).format(DATE_FORMAT).to_string()
    }
}

/// Project the next payout from `now`
///
/// A non-positive earn rate yields no progress, so the payout time collapses
/// to `now`. A balance already past the threshold gives a negative duration,
/// i.e. a payout time in the past.
pub fn estimate_next_payout(
    balance: Decimal,
    coin_per_min: Decimal,
    min_payout: Decimal,
    now: DateTime<Utc>,
) -> PayoutEstimate {
    let amount_needed = min_payout - balance;

    let minutes_to_threshold = if coin_per_min > Decimal::ZERO {
        let overflow = if amount_needed.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        };
        amount_needed.checked_div(coin_per_min).unwrap_or(overflow)
    } else {
        Decimal::ZERO
    };

    // Saturate at the representable range instead of overflowing
    let bound = if minutes_to_threshold.is_sign_negative() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    let next_payout = minutes_to_threshold
        .checked_mul(Decimal::from(60_000))
        .and_then(|millis| millis.round().to_i64())
        .and_then(Duration::try_milliseconds)
        .and_then(|offset| now.checked_add_signed(offset))
        .unwrap_or(bound);

    let elapsed_secs =
        Decimal::from((next_payout - now).num_milliseconds()) / Decimal::from(1000);
    let unpaid_at_payout =
        (elapsed_secs * coin_per_min / Decimal::from(60) + balance).round_dp(PAYOUT_DP);

    PayoutEstimate {
        minutes_to_threshold,
        next_payout,
        unpaid_at_payout,
    }
}
