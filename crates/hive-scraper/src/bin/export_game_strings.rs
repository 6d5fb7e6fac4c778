//! Write stored matches as UHP game strings.
//!
//! Filters come from `EXPORT_EXPANSIONS`, `EXPORT_INCLUDE_BOTS`,
//! `EXPORT_INCLUDE_BGA` and `EXPORT_INCLUDE_ENTOMOLOGY`; the file lands in
//! `GAME_STRINGS_DIR`.

use chrono::Utc;
use hive_scraper::config::ScraperConfig;
use hive_scraper::db;
use hive_scraper::export::export_game_strings;
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

    let summary = export_game_strings(&store, &config.export, &config.output_dir, Utc::now()).await?;
    println!(
        "Wrote {} game strings to {} ({} skipped)",
        summary.written,
        summary.path.display(),
        summary.skipped.len()
    );
    Ok(())
}
