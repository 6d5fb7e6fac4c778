//! Re-derive expansion flags for every stored match.
//!
//! BoardGameArena tables are looked up with the accounts in
//! `BGA_ACCOUNTS_PATH`; Entomology tables through their metadata.

use hive_scraper::clients::bga::BgaLogin;
use hive_scraper::clients::entomology::EntomologyClient;
use hive_scraper::config::ScraperConfig;
use hive_scraper::db::{self, matches};
use hive_scraper::entomology::load_uuids;
use hive_scraper::expansions::{correct_bga, correct_entomology};
use hive_scraper::identity::{load_credentials, IdentityPool};
use hive_scraper::pipeline::StopReason;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ScraperConfig::from_env()?;

    let store = db::pool::create_pool(&config.database_url).await?;
    db::pool::run_migrations(&store).await?;

    let mut table_ids: Vec<i64> = matches::unique_table_ids(&store).await?.into_iter().collect();
    table_ids.sort_unstable();
    tracing::info!(count = table_ids.len(), "Updating table flags");

    match load_uuids(&config.entomology.uuids_path) {
        Ok(uuids) => {
            let archive = EntomologyClient::new(&config.entomology.base_url)?;
            let summary = correct_entomology(&archive, &store, &uuids, &table_ids).await?;
            tracing::info!(updated = summary.updated, skipped = summary.skipped.len(), "Entomology flags done");
        }
        Err(e) => tracing::warn!(error = %e, "No uuid list, skipping Entomology tables"),
    }

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

    let credentials = load_credentials(&config.accounts_path)?;
    let mut identities = IdentityPool::new(BgaLogin::new(&config.bga_base_url), credentials);
    let summary = correct_bga(&mut identities, &store, &table_ids, &config.policy, &cancel).await?;
    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped.len(),
        remaining = summary.remaining.len(),
        stop = ?summary.stop,
        "BGA flags done"
    );

    if let StopReason::Fatal(reason) = &summary.stop {
        anyhow::bail!("flag update halted: {reason}");
    }
    Ok(())
}
