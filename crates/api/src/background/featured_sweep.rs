//! In-process featured sweep loop.
//!
//! Optional alternative to an external cron hitting `POST /featured/sweep`.
//! Running both is safe; overlapping sweeps split the due rows between them.

use std::time::Duration;

use adslot_engine::LifecycleSweeper;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run the sweep every `interval` until `cancel` is triggered.
///
/// The first sweep runs immediately so rows that came due while the process
/// was down are handled at startup.
pub async fn run(sweeper: LifecycleSweeper, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Featured sweep job started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Featured sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweeper.sweep(Utc::now()).await {
                    Ok(report) => {
                        if report.activated == 0 && report.expired == 0 {
                            tracing::debug!("Featured sweep: nothing due");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Featured sweep failed");
                    }
                }
            }
        }
    }
}
