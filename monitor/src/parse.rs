//! Field extraction for Cruxpool API responses
//!
//! Every endpoint wraps its payload as `{"data": {...}}`. Each parser here
//! reads one endpoint's `data` object by fixed key paths and either returns
//! the fully converted result or a [`StepError`] naming the key that was
//! missing or malformed. Parsers never return partial results.

use crate::client::FetchError;
use crate::models::{
    convert_amount, hashrate_mh, EarningsEstimate, HistoryRecord, PayoutRecord, WorkerRecord,
    BALANCE_DP, PAYOUT_DP,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One fetch+parse step of a refresh, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Miner,
    EstimatedEarnings,
    Balance,
    Payments,
    History,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Miner,
        Step::EstimatedEarnings,
        Step::Balance,
        Step::Payments,
        Step::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Miner => "miner",
            Step::EstimatedEarnings => "estimated_earnings",
            Step::Balance => "balance",
            Step::Payments => "payments",
            Step::History => "history",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("{step}: {source}")]
    Transport {
        step: Step,
        #[source]
        source: FetchError,
    },

    #[error("{step}: missing field '{key}'")]
    MissingField { step: Step, key: String },

    #[error("{step}: field '{key}' is not {expected}")]
    InvalidField {
        step: Step,
        key: String,
        expected: &'static str,
    },
}

impl StepError {
    pub fn step(&self) -> Step {
        match self {
            StepError::Transport { step, .. }
            | StepError::MissingField { step, .. }
            | StepError::InvalidField { step, .. } => *step,
        }
    }
}

pub type StepResult<T> = Result<T, StepError>;

/// Miner endpoint payload before it is stamped with a snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct MinerStatus {
    pub hashrate_reported: f64,
    pub hashrate_current: f64,
    pub hashrate_3h: f64,
    pub hashrate_day: f64,
    pub coin_per_min: Decimal,
    pub workers: Vec<WorkerRecord>,
}

pub fn parse_miner(body: &Value) -> StepResult<MinerStatus> {
    let fields = Fields::data(body, Step::Miner)?;

    let hashrate_reported = fields.hashrate("reportedHashrate")?;
    let hashrate_current = fields.hashrate("realtimeHashrate")?;
    let hashrate_3h = fields.hashrate("hashrate")?;
    let hashrate_day = fields.hashrate("avgHashrate")?;
    let coin_per_min = fields.decimal("coinPerMins")?;

    let workers = fields
        .object("workers")?
        .iter()
        .map(|(name, worker)| -> StepResult<WorkerRecord> {
            let worker = fields.nested(worker, &format!("workers.{}", name))?;
            Ok(WorkerRecord {
                name: name.clone(),
                hashrate_reported: worker.hashrate("reported")?,
                hashrate_current: worker.hashrate("realtimehr")?,
                hashrate_3h: worker.hashrate("hr")?,
                hashrate_day: worker.hashrate("hr2")?,
                shares: worker.count("shares")?,
                invalid_shares: worker.count("invalidShares")?,
                stale_shares: worker.count("staleShares")?,
            })
        })
        .collect::<StepResult<Vec<_>>>()?;

    Ok(MinerStatus {
        hashrate_reported,
        hashrate_current,
        hashrate_3h,
        hashrate_day,
        coin_per_min,
        workers,
    })
}

pub fn parse_earnings(body: &Value) -> StepResult<EarningsEstimate> {
    let fields = Fields::data(body, Step::EstimatedEarnings)?;

    Ok(EarningsEstimate {
        per_hour: convert_amount(fields.decimal("estEarningsPerHour")?, BALANCE_DP),
        per_day: convert_amount(fields.decimal("estEarningsPerDay")?, BALANCE_DP),
        per_week: convert_amount(fields.decimal("estEarningsPerWeek")?, BALANCE_DP),
        per_month: convert_amount(fields.decimal("estEarningsPerMonth")?, BALANCE_DP),
    })
}

pub fn parse_balance(body: &Value) -> StepResult<Decimal> {
    let fields = Fields::data(body, Step::Balance)?;
    Ok(convert_amount(fields.decimal("balance")?, BALANCE_DP))
}

pub fn parse_payments(body: &Value) -> StepResult<Vec<PayoutRecord>> {
    let fields = Fields::data(body, Step::Payments)?;

    fields
        .array("payments")?
        .iter()
        .enumerate()
        .map(|(i, payout)| -> StepResult<PayoutRecord> {
            let payout = fields.nested(payout, &format!("payments[{}]", i))?;
            Ok(PayoutRecord {
                paid_on: payout.timestamp("timestamp")?,
                amount: convert_amount(payout.decimal("amount")?, PAYOUT_DP),
                tx: payout.text("tx")?,
            })
        })
        .collect()
}

pub fn parse_history(body: &Value) -> StepResult<Vec<HistoryRecord>> {
    let fields = Fields::data(body, Step::History)?;

    fields
        .array("history")?
        .iter()
        .enumerate()
        .map(|(i, entry)| -> StepResult<HistoryRecord> {
            let entry = fields.nested(entry, &format!("history[{}]", i))?;
            Ok(HistoryRecord {
                timestamp: entry.timestamp("timestamp")?,
                amount: convert_amount(entry.decimal("amount")?, PAYOUT_DP),
            })
        })
        .collect()
}

/// A JSON object being read on behalf of one step
///
/// `path` is the key path of the object itself, used as a prefix so errors
/// point at e.g. `workers.rig1.hr` rather than just `hr`.
struct Fields<'a> {
    step: Step,
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn data(body: &'a Value, step: Step) -> StepResult<Self> {
        let data = body.get("data").ok_or_else(|| StepError::MissingField {
            step,
            key: "data".to_string(),
        })?;

        let map = data.as_object().ok_or_else(|| StepError::InvalidField {
            step,
            key: "data".to_string(),
            expected: "an object",
        })?;

        Ok(Self {
            step,
            path: String::new(),
            map,
        })
    }

    fn nested<'b>(&self, value: &'b Value, path: &str) -> StepResult<Fields<'b>> {
        let map = value.as_object().ok_or_else(|| StepError::InvalidField {
            step: self.step,
            key: path.to_string(),
            expected: "an object",
        })?;

        Ok(Fields {
            step: self.step,
            path: path.to_string(),
            map,
        })
    }

    fn key_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn get(&self, key: &str) -> StepResult<&'a Value> {
        self.map.get(key).ok_or_else(|| StepError::MissingField {
            step: self.step,
            key: self.key_path(key),
        })
    }

    fn invalid(&self, key: &str, expected: &'static str) -> StepError {
        StepError::InvalidField {
            step: self.step,
            key: self.key_path(key),
            expected,
        }
    }

    fn object(&self, key: &str) -> StepResult<&'a Map<String, Value>> {
        self.get(key)?
            .as_object()
            .ok_or_else(|| self.invalid(key, "an object"))
    }

    fn array(&self, key: &str) -> StepResult<&'a Vec<Value>> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| self.invalid(key, "an array"))
    }

    fn decimal(&self, key: &str) -> StepResult<Decimal> {
        let value = self.get(key)?;
        decimal_from(value).ok_or_else(|| self.invalid(key, "a number"))
    }

    fn hashrate(&self, key: &str) -> StepResult<f64> {
        let value = self.get(key)?;
        let raw = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        raw.filter(|h| h.is_finite())
            .map(hashrate_mh)
            .ok_or_else(|| self.invalid(key, "a number"))
    }

    fn count(&self, key: &str) -> StepResult<u64> {
        self.get(key)?
            .as_u64()
            .ok_or_else(|| self.invalid(key, "a non-negative integer"))
    }

    fn text(&self, key: &str) -> StepResult<String> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(key, "a string"))
    }

    /// Whole seconds, either as an integer or a float with no fraction
    fn timestamp(&self, key: &str) -> StepResult<DateTime<Utc>> {
        let value = self.get(key)?;
        value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|secs| secs.fract() == 0.0 && secs.abs() < i64::MAX as f64)
                    .map(|secs| secs as i64)
            })
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| self.invalid(key, "a unix timestamp"))
    }
}

fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                // Go through the shortest textual form so 0.0001 stays 0.0001
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .ok()
                    .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            }
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn miner_body() -> Value {
        json!({
            "data": {
                "reportedHashrate": 150_000_000u64,
                "realtimeHashrate": 148_500_000u64,
                "hashrate": 149_990_000u64,
                "avgHashrate": 151_234_567u64,
                "coinPerMins": 0.0001,
                "workers": {
                    "rig2": {
                        "reported": 100_000_000u64, "realtimehr": 99_000_000u64,
                        "hr": 98_000_000u64, "hr2": 97_000_000u64,
                        "shares": 1200, "invalidShares": 2, "staleShares": 5
                    },
                    "rig1": {
                        "reported": 50_000_000u64, "realtimehr": 49_500_000u64,
                        "hr": 51_990_000u64, "hr2": 54_234_567u64,
                        "shares": 600, "invalidShares": 0, "staleShares": 1
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_miner() {
        let status = parse_miner(&miner_body()).unwrap();

        assert_eq!(status.hashrate_reported, 150.0);
        assert_eq!(status.hashrate_current, 148.5);
        assert_eq!(status.hashrate_3h, 149.99);
        assert_eq!(status.hashrate_day, 151.23);
        assert_eq!(status.coin_per_min, Decimal::from_str("0.0001").unwrap());

        // Response order is kept, not sorted
        let names: Vec<_> = status.workers.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["rig2", "rig1"]);
        assert_eq!(status.workers[1].hashrate_day, 54.23);
        assert_eq!(status.workers[0].stale_shares, 5);
    }

    #[test]
    fn test_missing_coin_per_mins() {
        let mut body = miner_body();
        body["data"].as_object_mut().unwrap().remove("coinPerMins");

        let err = parse_miner(&body).unwrap_err();
        assert_eq!(
            err,
            StepError::MissingField {
                step: Step::Miner,
                key: "coinPerMins".to_string()
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("miner"));
        assert!(msg.contains("coinPerMins"));
    }

    #[test]
    fn test_missing_worker_field_names_path() {
        let mut body = miner_body();
        body["data"]["workers"]["rig1"]
            .as_object_mut()
            .unwrap()
            .remove("hr2");

        let err = parse_miner(&body).unwrap_err();
        assert_eq!(
            err,
            StepError::MissingField {
                step: Step::Miner,
                key: "workers.rig1.hr2".to_string()
            }
        );
    }

    #[test]
    fn test_missing_data_object() {
        let err = parse_balance(&json!({"status": "ok"})).unwrap_err();
        assert_eq!(
            err,
            StepError::MissingField {
                step: Step::Balance,
                key: "data".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_type_is_invalid_field() {
        let err = parse_balance(&json!({"data": {"balance": [1, 2]}})).unwrap_err();
        assert!(matches!(
            err,
            StepError::InvalidField { step: Step::Balance, ref key, .. } if key == "balance"
        ));
    }

    #[test]
    fn test_parse_balance_and_earnings() {
        let balance = parse_balance(&json!({"data": {"balance": 1_234_567_890u64}})).unwrap();
        assert_eq!(balance, Decimal::from_str("12.35").unwrap());

        // Numeric strings are accepted
        let balance = parse_balance(&json!({"data": {"balance": "500000000"}})).unwrap();
        assert_eq!(balance, Decimal::from(5));

        let earnings = parse_earnings(&json!({"data": {
            "estEarningsPerHour": 1_000_000u64,
            "estEarningsPerDay": 24_000_000u64,
            "estEarningsPerWeek": 168_000_000u64,
            "estEarningsPerMonth": 720_000_000u64
        }}))
        .unwrap();
        assert_eq!(earnings.per_hour, Decimal::from_str("0.01").unwrap());
        assert_eq!(earnings.per_day, Decimal::from_str("0.24").unwrap());
        assert_eq!(earnings.per_week, Decimal::from_str("1.68").unwrap());
        assert_eq!(earnings.per_month, Decimal::from_str("7.2").unwrap());
    }

    #[test]
    fn test_parse_payments() {
        let payouts = parse_payments(&json!({"data": {"payments": [
            {"timestamp": 1_622_729_279, "amount": 10_512_345u64, "tx": "0xaaa"},
            {"timestamp": 1_620_000_000, "amount": 10_000_000u64, "tx": "0xbbb"}
        ]}}))
        .unwrap();

        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].amount, Decimal::from_str("0.10512").unwrap());
        assert_eq!(payouts[0].tx, "0xaaa");
        assert_eq!(payouts[0].paid_on.timestamp(), 1_622_729_279);
        assert_eq!(payouts[1].amount, Decimal::from_str("0.1").unwrap());
    }

    #[test]
    fn test_payments_are_all_or_nothing() {
        let err = parse_payments(&json!({"data": {"payments": [
            {"timestamp": 1_622_729_279, "amount": 10_512_345u64, "tx": "0xaaa"},
            {"timestamp": 1_620_000_000, "amount": 10_000_000u64}
        ]}}))
        .unwrap_err();

        assert_eq!(
            err,
            StepError::MissingField {
                step: Step::Payments,
                key: "payments[1].tx".to_string()
            }
        );
    }

    #[test]
    fn test_parse_history() {
        let history = parse_history(&json!({"data": {"history": [
            {"timestamp": 1_622_505_600, "amount": 3_141_592u64}
        ]}}))
        .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, Decimal::from_str("0.03142").unwrap());
        assert_eq!(history[0].timestamp_display(), "2021-06-01 00:00");
    }

    #[test]
    fn test_whole_float_timestamp() {
        let history = parse_history(&json!({"data": {"history": [
            {"timestamp": 1_622_505_600.0, "amount": 100_000_000u64}
        ]}}))
        .unwrap();
        assert_eq!(history[0].timestamp_display(), "2021-06-01 00:00");

        let payouts = parse_payments(&json!({"data": {"payments": [
            {"timestamp": 1_622_729_279.0, "amount": 100_000_000u64, "tx": "0xabc"}
        ]}}))
        .unwrap();
        assert_eq!(payouts[0].paid_on.timestamp(), 1_622_729_279);
    }

    #[test]
    fn test_fractional_timestamp_is_invalid() {
        let err = parse_history(&json!({"data": {"history": [
            {"timestamp": 1_622_505_600.5, "amount": 100_000_000u64}
        ]}}))
        .unwrap_err();
        assert!(matches!(err, StepError::InvalidField { .. }));
    }
}
