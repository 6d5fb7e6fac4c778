use std::collections::HashSet;
use std::ops::RangeInclusive;

use hive_core::{ExpansionFlags, MatchData, MatchRecord, Outcome};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::actions;

/// Table ids BoardGameArena hands out. Everything outside belongs to other sources.
pub const BGA_IDS: RangeInclusive<i64> = 100_000_000..=999_999_999;

pub const BOT_NAMES: &[&str] = &["Dumbot", "WeakBot", "SmartBot"];

/// Which persisted matches the export pass should see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFilter {
    pub expansions: ExpansionFlags,
    pub include_bots: bool,
    pub include_bga: bool,
    pub include_entomology: bool,
}

impl Default for ExportFilter {
    fn default() -> Self {
        Self {
            expansions: ExpansionFlags::ALL,
            include_bots: false,
            include_bga: true,
            include_entomology: false,
        }
    }
}

fn outcome_columns(outcome: &Outcome) -> (&'static str, Option<&str>) {
    match outcome {
        Outcome::Draw => ("draw", None),
        Outcome::Tie => ("tie", None),
        Outcome::Winner(id) => ("winner", Some(id.as_str())),
        Outcome::Reported(text) => ("reported", Some(text.as_str())),
    }
}

fn outcome_from_columns(kind: &str, value: Option<String>) -> Outcome {
    match (kind, value) {
        ("winner", Some(id)) => Outcome::Winner(id),
        ("reported", Some(text)) => Outcome::Reported(text),
        ("tie", _) => Outcome::Tie,
        _ => Outcome::Draw,
    }
}

/// All table ids already collected, across every source.
pub async fn unique_table_ids(pool: &SqlitePool) -> Result<HashSet<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT DISTINCT table_id FROM matches")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Create or replace one match row.
pub async fn upsert_match<'e, E>(executor: E, record: &MatchRecord) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (winner_kind, winner) = outcome_columns(&record.outcome);

    sqlx::query(
        r#"INSERT INTO matches (
            table_id, player_white, player_black, winner_kind, winner,
            uses_mosquito, uses_ladybug, uses_pillbug
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT (table_id) DO UPDATE SET
            player_white = excluded.player_white,
            player_black = excluded.player_black,
            winner_kind = excluded.winner_kind,
            winner = excluded.winner,
            uses_mosquito = excluded.uses_mosquito,
            uses_ladybug = excluded.uses_ladybug,
            uses_pillbug = excluded.uses_pillbug"#,
    )
    .bind(record.table_id)
    .bind(&record.white)
    .bind(&record.black)
    .bind(winner_kind)
    .bind(winner)
    .bind(record.expansions.mosquito)
    .bind(record.expansions.ladybug)
    .bind(record.expansions.pillbug)
    .execute(executor)
    .await?;

    Ok(())
}

/// Store a match and its actions atomically. Actions stored earlier for the
/// same table are replaced.
pub async fn insert_match_data(pool: &SqlitePool, data: &MatchData) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    upsert_match(&mut *tx, &data.record).await?;
    actions::delete_actions(&mut *tx, data.record.table_id).await?;
    actions::upsert_actions(&mut *tx, data.record.table_id, &data.actions).await?;
    tx.commit().await
}

/// Overwrite only the three expansion flags. Returns whether the match exists.
pub async fn update_expansion_flags(
    pool: &SqlitePool,
    table_id: i64,
    flags: ExpansionFlags,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE matches SET uses_mosquito = ?1, uses_ladybug = ?2, uses_pillbug = ?3 WHERE table_id = ?4",
    )
    .bind(flags.mosquito)
    .bind(flags.ladybug)
    .bind(flags.pillbug)
    .bind(table_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

type MatchRow = (i64, String, String, String, Option<String>, bool, bool, bool);

const MATCH_COLUMNS: &str = "SELECT table_id, player_white, player_black, winner_kind, winner, \
     uses_mosquito, uses_ladybug, uses_pillbug FROM matches";

fn record_from_row(row: MatchRow) -> MatchRecord {
    let (table_id, white, black, winner_kind, winner, m, l, p) = row;
    MatchRecord {
        table_id,
        white,
        black,
        outcome: outcome_from_columns(&winner_kind, winner),
        expansions: ExpansionFlags::new(m, l, p),
    }
}

pub async fn get_match(pool: &SqlitePool, table_id: i64) -> Result<Option<MatchRecord>, sqlx::Error> {
    let query = format!("{MATCH_COLUMNS} WHERE table_id = ?1");
    let row: Option<MatchRow> = sqlx::query_as(&query)
        .bind(table_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(record_from_row))
}

/// Matches selected by `filter`, ordered by table id.
pub async fn load_matches(
    pool: &SqlitePool,
    filter: &ExportFilter,
) -> Result<Vec<MatchRecord>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(MATCH_COLUMNS);
    qb.push(" WHERE uses_mosquito = ")
        .push_bind(filter.expansions.mosquito)
        .push(" AND uses_ladybug = ")
        .push_bind(filter.expansions.ladybug)
        .push(" AND uses_pillbug = ")
        .push_bind(filter.expansions.pillbug);

    match (filter.include_bga, filter.include_entomology) {
        (true, true) => {}
        (true, false) => {
            qb.push(" AND table_id BETWEEN ")
                .push_bind(*BGA_IDS.start())
                .push(" AND ")
                .push_bind(*BGA_IDS.end());
        }
        (false, true) => {
            qb.push(" AND table_id NOT BETWEEN ")
                .push_bind(*BGA_IDS.start())
                .push(" AND ")
                .push_bind(*BGA_IDS.end());
        }
        (false, false) => {
            qb.push(" AND 0");
        }
    }

    if !filter.include_bots {
        for column in ["player_white", "player_black"] {
            qb.push(format!(" AND {column} NOT IN ("));
            let mut names = qb.separated(", ");
            for bot in BOT_NAMES {
                names.push_bind(*bot);
            }
            names.push_unseparated(")");
        }
    }

    qb.push(" ORDER BY table_id");

    let rows: Vec<MatchRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(record_from_row).collect())
}
