//! Cruxpool miner monitor
//!
//! Polls the Cruxpool HTTP API for one wallet (miner status, estimated
//! earnings, balance, payments and monthly history), keeps the results as
//! typed records and projects when the next payout will happen.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod models;
pub mod parse;
pub mod payout;

pub use aggregator::{Endpoints, MinerIdentity, MinerStatusAggregator, RefreshReport, StepOutcome};
pub use client::{FetchError, HttpFetcher, JsonFetcher};
pub use models::{HistoryRecord, PayoutRecord, WorkerRecord};
pub use parse::{Step, StepError};
pub use payout::PayoutEstimate;
