//! One-shot featured sweep for external schedulers.
//!
//! Activates due pending placements, expires overdue active ones, prints the
//! report as JSON on stdout and exits. Exits with status 1 on failure so cron
//! wrappers can alert.

use adslot_engine::{EngineConfig, LifecycleSweeper};
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adslot_sweep=debug,adslot_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = adslot_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    adslot_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    let sweeper = LifecycleSweeper::new(
        pool,
        config.sweep_window,
        config.sweep_batch_size,
        config.tx_timeout,
    );

    match sweeper.sweep(Utc::now()).await {
        Ok(report) => match serde_json::to_string(&report) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to render sweep report"),
        },
        Err(e) => {
            tracing::error!(error = %e, "Featured sweep failed");
            std::process::exit(1);
        }
    }
}
