use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display format for snapshot and payout timestamps
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Decimal places kept for balances and earnings estimates
pub const BALANCE_DP: u32 = 2;

/// Decimal places kept for individual payouts and history entries
pub const PAYOUT_DP: u32 = 5;

/// Cruxpool reports amounts in units of 10e7 per coin
const AMOUNT_DIVISOR: i64 = 100_000_000;

/// Convert a raw H/s figure to MH/s, rounded to 2 decimals
///
/// Exact halves round to even, so 2.125 MH/s shows as 2.12.
pub fn hashrate_mh(hashrate: f64) -> f64 {
    (hashrate / 1_000_000.0 * 100.0).round_ties_even() / 100.0
}

/// Convert a raw pool amount to coins, rounded to `dp` decimals
pub fn convert_amount(raw: Decimal, dp: u32) -> Decimal {
    (raw / Decimal::from(AMOUNT_DIVISOR)).round_dp(dp)
}

/// Statistics for an individual worker, as of the latest miner snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub name: String,
    /// Hashrates in MH/s
    pub hashrate_reported: f64,
    pub hashrate_current: f64,
    pub hashrate_3h: f64,
    pub hashrate_day: f64,
    pub shares: u64,
    pub invalid_shares: u64,
    pub stale_shares: u64,
}

/// A payment made by the pool to the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub paid_on: DateTime<Utc>,
    /// Amount in coins (5 decimals)
    pub amount: Decimal,
    /// Transaction hash
    pub tx: String,
}

impl PayoutRecord {
    pub fn paid_on_display(&self) -> String {
        self.paid_on.format(DATE_FORMAT).to_string()
    }
}

/// One entry of the monthly earnings history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    /// Amount in coins (5 decimals)
    pub amount: Decimal,
}

impl HistoryRecord {
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }
}

/// Miner-level figures from the miner status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerSnapshot {
    /// Hashrates in MH/s
    pub hashrate_reported: f64,
    pub hashrate_current: f64,
    pub hashrate_3h: f64,
    pub hashrate_day: f64,
    /// Earn rate as reported by the pool (not converted)
    pub coin_per_min: Decimal,
    /// When this snapshot was taken (UTC)
    pub stat_time: DateTime<Utc>,
}

impl MinerSnapshot {
    pub fn stat_time_display(&self) -> String {
        self.stat_time.format(DATE_FORMAT).to_string()
    }
}

/// Earnings estimate for the configured reference hashrate, in coins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsEstimate {
    pub per_hour: Decimal,
    pub per_day: Decimal,
    pub per_week: Decimal,
    pub per_month: Decimal,
}
