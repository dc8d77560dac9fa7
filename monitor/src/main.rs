//! Cruxpool Monitor
//!
//! Periodically refreshes one wallet's status from the Cruxpool API and logs
//! hashrate, balance, share counts and the projected next payout.

use cruxpool_monitor::config::Config;
use cruxpool_monitor::{HttpFetcher, JsonFetcher, MinerStatusAggregator};

use chrono::FixedOffset;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/opt/cruxpool-monitor/config.toml".to_string());

    // Load configuration
    let config = Config::load_with_env(&config_path)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Cruxpool Monitor");
    info!(
        coin = %config.pool.coin,
        wallet = %config.pool.wallet,
        interval_secs = config.service.refresh_interval_secs,
        "Monitoring wallet"
    );

    let fetcher = HttpFetcher::new(config.pool.request_timeout())?;
    let aggregator = MinerStatusAggregator::with_api_base(
        &config.pool.api_base,
        config.pool.identity(),
        fetcher,
    );

    tokio::select! {
        _ = run_refresh_loop(
            aggregator,
            config.service.refresh_interval_secs,
            config.pool.display_offset(),
        ) => {}
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    info!("Cruxpool Monitor shut down");
    Ok(())
}

/// Refresh on a fixed interval until cancelled
async fn run_refresh_loop<F: JsonFetcher>(
    mut aggregator: MinerStatusAggregator<F>,
    interval_secs: u64,
    display_offset: FixedOffset,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !aggregator.update().await {
            let failed = aggregator
                .last_report()
                .map(|r| r.errors().count())
                .unwrap_or_default();
            if let Some(e) = aggregator.last_error() {
                error!(failed_steps = failed, "Refresh incomplete, last error: {}", e);
            }
        }

        log_summary(&aggregator, display_offset);
    }
}

fn log_summary<F: JsonFetcher>(aggregator: &MinerStatusAggregator<F>, offset: FixedOffset) {
    let Some(miner) = aggregator.miner() else {
        warn!("No miner status available yet");
        return;
    };

    info!(
        stat_time = %miner.stat_time_display(),
        reported_mh = miner.hashrate_reported,
        current_mh = miner.hashrate_current,
        avg_3h_mh = miner.hashrate_3h,
        avg_24h_mh = miner.hashrate_day,
        workers = aggregator.workers().len(),
        valid_shares = aggregator.valid_shares(),
        invalid_shares = aggregator.invalid_shares(),
        stale_shares = aggregator.stale_shares(),
        "Miner status"
    );

    if let Some(earnings) = aggregator.earnings() {
        info!(
            per_hour = %earnings.per_hour,
            per_day = %earnings.per_day,
            per_week = %earnings.per_week,
            per_month = %earnings.per_month,
            "Estimated earnings"
        );
    }

    if let (Some(balance), Some(payout)) = (aggregator.balance(), aggregator.next_payout()) {
        info!(
            balance = %balance,
            next_payout = %payout.next_payout_display(offset),
            unpaid_at_payout = %payout.unpaid_at_payout,
            "Next payout"
        );
    }

    if let Some(last) = aggregator.payouts().iter().max_by_key(|p| p.paid_on) {
        info!(
            paid_on = %last.paid_on_display(),
            amount = %last.amount,
            tx = %last.tx,
            total_recorded = aggregator.payouts().len(),
            "Most recent payout"
        );
    }
}
