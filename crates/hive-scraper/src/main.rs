//! BoardGameArena collection run.
//!
//! Logs in with the first usable account from `BGA_ACCOUNTS_PATH`, finds the
//! top arena players, and stores every replay of theirs not yet in the
//! database. Ctrl-C stops between tables and prints what is left.

use hive_scraper::clients::bga::BgaLogin;
use hive_scraper::config::ScraperConfig;
use hive_scraper::context::RunContext;
use hive_scraper::db;
use hive_scraper::identity::{load_credentials, IdentityPool};
use hive_scraper::pipeline::{self, StopReason};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ScraperConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let store = db::pool::create_pool(&config.database_url).await?;
    db::pool::run_migrations(&store).await?;

    let credentials = load_credentials(&config.accounts_path)?;
    tracing::info!(accounts = credentials.len(), "Loaded accounts");
    let identities = IdentityPool::new(BgaLogin::new(&config.bga_base_url), credentials);
    let mut ctx = RunContext::load(&store, identities, config.policy.clone()).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, stopping after the current table");
                cancel.cancel();
            }
        }
    });

    let summary = pipeline::run_bga(
        &mut ctx,
        &store,
        &config.window,
        config.ranking_players,
        &cancel,
    )
    .await?;

    if let StopReason::Fatal(reason) = &summary.stop {
        anyhow::bail!("run halted: {reason}");
    }
    Ok(())
}
