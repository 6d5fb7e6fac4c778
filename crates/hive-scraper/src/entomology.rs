//! Collection run over the Entomology archive.
//!
//! Games are addressed by uuid; the table id stored for a game is its index
//! in the uuid list, so the run can resume from a saved offset.

use std::collections::HashSet;
use std::path::Path;

use hive_core::replay::int_value;
use hive_core::{Action, ExpansionFlags, MatchData, MatchRecord, Outcome};
use scraper::{Html, Selector};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::clients::entomology::GameArchive;
use crate::clients::webdriver::PageRenderer;
use crate::config::{EntomologyConfig, RunPolicy};
use crate::db::matches;
use crate::error::ScrapeError;
use crate::pipeline::StopReason;
use crate::progress;

pub const MOVES_SELECTOR: &str = "#moves li";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntomologySummary {
    pub stored: usize,
    pub skipped: usize,
    pub next_index: usize,
    pub stop: StopReason,
}

/// Read the uuid list (a JSON array of strings).
pub fn load_uuids(path: &Path) -> Result<Vec<String>, ScrapeError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Why a game's metadata fails the configured filters, if it does.
pub fn rejection(meta: &Value, config: &EntomologyConfig) -> Option<String> {
    let variant = meta.get("variant").and_then(Value::as_str).unwrap_or("");
    if !config.variant.is_empty() && variant != config.variant {
        return Some(format!("variant {variant:?}"));
    }

    let flag = |key: &str| meta.get(key).and_then(int_value) == Some(1);
    if config.ranked_only && !flag("ranked") {
        return Some("not ranked".into());
    }
    if config.tournament_only && !flag("tournament") {
        return Some("not a tournament game".into());
    }
    None
}

pub fn record_from_metadata(table_id: i64, meta: &Value) -> MatchRecord {
    let name = |side: &str| {
        meta.get(side)
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let result = meta.get("result").and_then(Value::as_str).unwrap_or("");

    MatchRecord {
        table_id,
        white: name("white"),
        black: name("black"),
        outcome: Outcome::Reported(result.to_string()),
        expansions: ExpansionFlags::from_variant(meta.get("variant").and_then(Value::as_str).unwrap_or("")),
    }
}

/// Strip the move-number decorations the board page adds.
pub fn clean_notation(text: &str) -> String {
    text.replace(" .", "").replace("..., ", "").trim().to_string()
}

/// Moves from a rendered board page, numbered from 1 in page order.
pub fn parse_move_list(html: &str) -> Vec<Action> {
    let Ok(selector) = Selector::parse(MOVES_SELECTOR) else {
        return Vec::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .enumerate()
        .map(|(i, li)| Action::placed(i as i64 + 1, clean_notation(&li.text().collect::<String>())))
        .collect()
}

/// Fetch one game. `Ok(None)` means the game is filtered out or empty.
pub async fn ingest<G: GameArchive, R: PageRenderer>(
    archive: &G,
    renderer: &mut R,
    uuid: &str,
    table_id: i64,
    config: &EntomologyConfig,
) -> Result<Option<MatchData>, ScrapeError> {
    let Some(meta) = archive.metadata(uuid).await? else {
        tracing::info!(uuid, "Empty metadata, skipping");
        return Ok(None);
    };
    if let Some(reason) = rejection(&meta, config) {
        tracing::debug!(uuid, reason = %reason, "Filtered out");
        return Ok(None);
    }

    let html = renderer
        .render(&archive.board_url(uuid), MOVES_SELECTOR, config.render_timeout)
        .await?;
    let actions = parse_move_list(&html);
    if actions.is_empty() {
        tracing::warn!(uuid, "No moves on the board page");
        return Ok(None);
    }

    Ok(Some(MatchData {
        record: record_from_metadata(table_id, &meta),
        actions,
    }))
}

/// Walk the uuid list from the saved offset, storing every accepted game.
/// Progress is saved on interruption, on connection loss and at the end.
pub async fn run_entomology<G: GameArchive, R: PageRenderer>(
    archive: &mut G,
    renderer: &mut R,
    store: &SqlitePool,
    uuids: &[String],
    config: &EntomologyConfig,
    policy: &RunPolicy,
    cancel: &CancellationToken,
) -> Result<EntomologySummary, ScrapeError> {
    let start = progress::read_offset(&config.progress_path);
    let mut known: HashSet<i64> = matches::unique_table_ids(store).await?;
    tracing::info!(total = uuids.len(), start, known = known.len(), "Processing uuids");

    let mut stored = 0;
    let mut skipped = 0;
    let mut reconnects = 0;
    let mut index = start;

    let stop = loop {
        let Some(uuid) = uuids.get(index) else {
            break StopReason::Completed;
        };
        if cancel.is_cancelled() {
            break StopReason::Interrupted;
        }

        let table_id = index as i64;
        if known.contains(&table_id) {
            tracing::debug!(table_id, "Already stored");
            index += 1;
            continue;
        }

        match ingest(&*archive, renderer, uuid, table_id, config).await {
            Ok(Some(data)) => {
                if let Err(e) = matches::insert_match_data(store, &data).await {
                    progress::write_offset(&config.progress_path, index)?;
                    return Err(e.into());
                }
                tracing::info!(table_id, moves = data.actions.len(), "Inserted table");
                known.insert(table_id);
                stored += 1;
                index += 1;
                reconnects = 0;
            }
            Ok(None) => {
                skipped += 1;
                index += 1;
                reconnects = 0;
            }
            Err(e) if e.is_transport() => {
                progress::write_offset(&config.progress_path, index)?;
                reconnects += 1;
                if reconnects > policy.max_reconnects {
                    break StopReason::Fatal(format!("gave up after {} reconnects: {e}", policy.max_reconnects));
                }
                tracing::warn!(
                    uuid = %uuid,
                    error = %e,
                    delay_secs = policy.reconnect_delay.as_secs(),
                    "Connection lost, reconnecting"
                );

                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(policy.reconnect_delay) => false,
                    _ = cancel.cancelled() => true,
                };
                if interrupted {
                    break StopReason::Interrupted;
                }
                archive.reconnect()?;
                if let Err(e) = renderer.reconnect().await {
                    tracing::warn!(error = %e, "Browser reconnect failed");
                }
            }
            Err(e) => {
                tracing::warn!(uuid = %uuid, error = %e, "Skipping uuid");
                skipped += 1;
                index += 1;
                reconnects = 0;
            }
        }
    };

    progress::write_offset(&config.progress_path, index)?;
    tracing::info!(stored, skipped, next_index = index, stop = ?stop, "Entomology run finished");

    Ok(EntomologySummary {
        stored,
        skipped,
        next_index: index,
        stop,
    })
}
