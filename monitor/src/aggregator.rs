//! Miner status aggregation
//!
//! Handles:
//! - Building the Cruxpool endpoint URLs for one wallet
//! - Running the five fetch+parse steps that make up a refresh
//! - Keeping the latest snapshot and the cumulative payout/history lists
//! - Projecting the next payout from the refreshed figures

use crate::client::JsonFetcher;
use crate::models::{EarningsEstimate, HistoryRecord, MinerSnapshot, PayoutRecord, WorkerRecord};
use crate::parse::{self, Step, StepError, StepResult};
use crate::payout::{estimate_next_payout, PayoutEstimate};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://www.cruxpool.com/api";

/// Static identity of the monitored wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerIdentity {
    pub coin: String,
    pub wallet: String,
    /// Hashrate (H/s) used only to query the estimated earnings endpoint
    pub reference_hashrate: u64,
    /// Balance at which the pool triggers a payout, in coins
    pub min_payout: Decimal,
}

/// Endpoint URLs, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub miner: String,
    pub estimated_earnings: String,
    pub balance: String,
    pub payments: String,
    pub history: String,
}

impl Endpoints {
    pub fn new(api_base: &str, identity: &MinerIdentity) -> Self {
        let base = format!("{}/{}", api_base.trim_end_matches('/'), identity.coin);
        let miner = format!("{}/miner/{}", base, identity.wallet);

        Self {
            estimated_earnings: format!(
                "{}/estimatedEarnings/{}",
                base, identity.reference_hashrate
            ),
            balance: format!("{}/balance", miner),
            payments: format!("{}/payments", miner),
            history: format!("{}/history/month", miner),
            miner,
        }
    }

    pub fn url(&self, step: Step) -> &str {
        match step {
            Step::Miner => &self.miner,
            Step::EstimatedEarnings => &self.estimated_earnings,
            Step::Balance => &self.balance,
            Step::Payments => &self.payments,
            Step::History => &self.history,
        }
    }
}

/// Result of a single step within a refresh
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: Step,
    pub result: Result<(), StepError>,
}

impl StepOutcome {
    pub fn error(&self) -> Option<&StepError> {
        self.result.as_ref().err()
    }
}

/// Ordered per-step outcomes of one refresh
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<StepOutcome>,
}

impl RefreshReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &StepError> {
        self.outcomes.iter().filter_map(StepOutcome::error)
    }

    /// Error of the last step that failed, if any
    pub fn last_error(&self) -> Option<&StepError> {
        self.outcomes.iter().rev().find_map(StepOutcome::error)
    }
}

/// Everything the aggregator has learned so far
#[derive(Debug, Clone, Default)]
struct Snapshot {
    miner: Option<MinerSnapshot>,
    workers: Vec<WorkerRecord>,
    earnings: Option<EarningsEstimate>,
    balance: Option<Decimal>,
    payouts: Vec<PayoutRecord>,
    history: Vec<HistoryRecord>,
    next_payout: Option<PayoutEstimate>,
}

/// Cruxpool client for one wallet
///
/// `update` may be called repeatedly. The worker list is replaced on every
/// successful miner step; payouts and history are appended to and never
/// cleared. Failed steps leave the previous values in place.
pub struct MinerStatusAggregator<F: JsonFetcher> {
    identity: MinerIdentity,
    endpoints: Endpoints,
    fetcher: F,
    snapshot: Snapshot,
    last_report: Option<RefreshReport>,
}

impl<F: JsonFetcher> MinerStatusAggregator<F> {
    pub fn new(identity: MinerIdentity, fetcher: F) -> Self {
        Self::with_api_base(DEFAULT_API_BASE, identity, fetcher)
    }

    pub fn with_api_base(api_base: &str, identity: MinerIdentity, fetcher: F) -> Self {
        let endpoints = Endpoints::new(api_base, &identity);
        Self {
            identity,
            endpoints,
            fetcher,
            snapshot: Snapshot::default(),
            last_report: None,
        }
    }

    /// Refresh everything; true iff all five steps succeeded
    pub async fn update(&mut self) -> bool {
        self.refresh().await.all_succeeded()
    }

    pub async fn refresh(&mut self) -> &RefreshReport {
        self.refresh_at(Utc::now()).await
    }

    /// Run every step against `now`, even after earlier failures
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> &RefreshReport {
        let mut outcomes = Vec::with_capacity(Step::ALL.len());

        for step in Step::ALL {
            let result = self.run_step(step, now).await;
            if let Err(ref e) = result {
                warn!(
                    coin = %self.identity.coin,
                    step = %step,
                    error = %e,
                    "Refresh step failed"
                );
            }
            outcomes.push(StepOutcome { step, result });
        }

        self.update_next_payout(now);

        let report = RefreshReport {
            started_at: now,
            outcomes,
        };

        if report.all_succeeded() {
            info!(
                coin = %self.identity.coin,
                workers = self.snapshot.workers.len(),
                balance = ?self.snapshot.balance,
                next_payout = ?self.snapshot.next_payout.map(|p| p.next_payout),
                "Miner status refreshed"
            );
        }

        self.last_report.insert(report)
    }

    async fn run_step(&mut self, step: Step, now: DateTime<Utc>) -> StepResult<()> {
        let url = self.endpoints.url(step);
        debug!(step = %step, url = %url, "Fetching");

        let body = self
            .fetcher
            .fetch_json(url)
            .await
            .map_err(|source| StepError::Transport { step, source })?;

        match step {
            Step::Miner => {
                let status = parse::parse_miner(&body)?;
                self.snapshot.miner = Some(MinerSnapshot {
                    hashrate_reported: status.hashrate_reported,
                    hashrate_current: status.hashrate_current,
                    hashrate_3h: status.hashrate_3h,
                    hashrate_day: status.hashrate_day,
                    coin_per_min: status.coin_per_min,
                    stat_time: now,
                });
                self.snapshot.workers = status.workers;
            }
            Step::EstimatedEarnings => {
                self.snapshot.earnings = Some(parse::parse_earnings(&body)?);
            }
            Step::Balance => {
                self.snapshot.balance = Some(parse::parse_balance(&body)?);
            }
            Step::Payments => {
                let payouts = parse::parse_payments(&body)?;
                self.snapshot.payouts.extend(payouts);
            }
            Step::History => {
                let history = parse::parse_history(&body)?;
                self.snapshot.history.extend(history);
            }
        }

        Ok(())
    }

    fn update_next_payout(&mut self, now: DateTime<Utc>) {
        let (Some(balance), Some(miner)) = (self.snapshot.balance, self.snapshot.miner.as_ref())
        else {
            return;
        };

        self.snapshot.next_payout = Some(estimate_next_payout(
            balance,
            miner.coin_per_min,
            self.identity.min_payout,
            now,
        ));
    }

    pub fn identity(&self) -> &MinerIdentity {
        &self.identity
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn last_report(&self) -> Option<&RefreshReport> {
        self.last_report.as_ref()
    }

    /// Error of the last failing step in the most recent refresh
    pub fn last_error(&self) -> Option<&StepError> {
        self.last_report.as_ref().and_then(RefreshReport::last_error)
    }

    pub fn miner(&self) -> Option<&MinerSnapshot> {
        self.snapshot.miner.as_ref()
    }

    pub fn hashrate_reported(&self) -> Option<f64> {
        self.miner().map(|m| m.hashrate_reported)
    }

    pub fn hashrate_current(&self) -> Option<f64> {
        self.miner().map(|m| m.hashrate_current)
    }

    pub fn hashrate_3h(&self) -> Option<f64> {
        self.miner().map(|m| m.hashrate_3h)
    }

    pub fn hashrate_day(&self) -> Option<f64> {
        self.miner().map(|m| m.hashrate_day)
    }

    pub fn coin_per_min(&self) -> Option<Decimal> {
        self.miner().map(|m| m.coin_per_min)
    }

    pub fn stat_time(&self) -> Option<DateTime<Utc>> {
        self.miner().map(|m| m.stat_time)
    }

    pub fn earnings(&self) -> Option<&EarningsEstimate> {
        self.snapshot.earnings.as_ref()
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.snapshot.balance
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.snapshot.workers
    }

    pub fn payouts(&self) -> &[PayoutRecord] {
        &self.snapshot.payouts
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.snapshot.history
    }

    pub fn next_payout(&self) -> Option<&PayoutEstimate> {
        self.snapshot.next_payout.as_ref()
    }

    pub fn valid_shares(&self) -> u64 {
        self.snapshot.workers.iter().map(|w| w.shares).sum()
    }

    pub fn invalid_shares(&self) -> u64 {
        self.snapshot.workers.iter().map(|w| w.invalid_shares).sum()
    }

    pub fn stale_shares(&self) -> u64 {
        self.snapshot.workers.iter().map(|w| w.stale_shares).sum()
    }
}
