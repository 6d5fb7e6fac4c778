//! Entomology collection run.
//!
//! Walks the uuid list in `ENTOMOLOGY_UUIDS_PATH`, rendering each accepted
//! game's board through the WebDriver at `WEBDRIVER_URL`. Resumes from the
//! offset in `ENTOMOLOGY_PROGRESS_PATH`.

use hive_scraper::clients::entomology::EntomologyClient;
use hive_scraper::clients::webdriver::WebDriverRenderer;
use hive_scraper::config::ScraperConfig;
use hive_scraper::db;
use hive_scraper::entomology::{load_uuids, run_entomology};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ScraperConfig::from_env()?;
    let ento = &config.entomology;

    let store = db::pool::create_pool(&config.database_url).await?;
    db::pool::run_migrations(&store).await?;

    let uuids = load_uuids(&ento.uuids_path)?;
    let mut archive = EntomologyClient::new(&ento.base_url)?;
    let mut renderer = WebDriverRenderer::new(&ento.webdriver_url)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl-C received, saving progress");
                cancel.cancel();
            }
        }
    });

    let result = run_entomology(
        &mut archive,
        &mut renderer,
        &store,
        &uuids,
        ento,
        &config.policy,
        &cancel,
    )
    .await;
    renderer.quit().await;

    let summary = result?;
    tracing::info!(
        stored = summary.stored,
        skipped = summary.skipped,
        next_index = summary.next_index,
        "Done"
    );
    Ok(())
}
