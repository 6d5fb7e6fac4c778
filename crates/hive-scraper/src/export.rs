//! Export stored matches as UHP game strings, one per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hive_core::uhp;
use sqlx::SqlitePool;

use crate::db::{actions, matches::{self, ExportFilter}};
use crate::error::ScrapeError;

#[derive(Debug)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: Vec<i64>,
}

/// `GameStrings_Base+MLP+NoBots_20240221_173000.txt`
pub fn export_file_name(filter: &ExportFilter, at: DateTime<Utc>) -> String {
    let bots = if filter.include_bots { "+Bots" } else { "+NoBots" };
    format!(
        "GameStrings_{}{}_{}.txt",
        uhp::game_type(filter.expansions),
        bots,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Canonicalize every match selected by `filter` into a new file under
/// `output_dir`. Refuses to overwrite an existing file.
pub async fn export_game_strings(
    store: &SqlitePool,
    filter: &ExportFilter,
    output_dir: &Path,
    at: DateTime<Utc>,
) -> Result<ExportSummary, ScrapeError> {
    let records = matches::load_matches(store, filter).await?;
    tracing::info!(count = records.len(), ?filter, "Exporting matches");

    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(export_file_name(filter, at));
    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let mut out = BufWriter::new(file);

    let mut written = 0;
    let mut skipped = Vec::new();

    for record in &records {
        let moves = actions::ordered_actions(store, record.table_id).await?;
        match uhp::canonicalize(record, &moves) {
            Ok(line) => {
                writeln!(out, "{line}")?;
                written += 1;
            }
            Err(e) => {
                tracing::warn!(table_id = record.table_id, error = %e, "Skipping table");
                skipped.push(record.table_id);
            }
        }
    }
    out.flush()?;

    tracing::info!(path = %path.display(), written, skipped = skipped.len(), "Export finished");
    Ok(ExportSummary {
        path,
        written,
        skipped,
    })
}
