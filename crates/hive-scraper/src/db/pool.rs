use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // Every connection to an in-memory database opens a fresh, empty one.
    if database_url.contains(":memory:") {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
}

/// Create the schema inline.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Players we searched match histories for
CREATE TABLE IF NOT EXISTS players (
    player_id             TEXT PRIMARY KEY,
    last_search_timestamp INTEGER NOT NULL
);

-- One row per collected match. table_id ranges partition sources:
-- BoardGameArena ids are 100000000..=999999999, Entomology ids sit below.
CREATE TABLE IF NOT EXISTS matches (
    table_id       INTEGER PRIMARY KEY,
    player_white   TEXT NOT NULL,
    player_black   TEXT NOT NULL,
    winner_kind    TEXT NOT NULL,
    winner         TEXT,
    uses_mosquito  INTEGER NOT NULL DEFAULT 0,
    uses_ladybug   INTEGER NOT NULL DEFAULT 0,
    uses_pillbug   INTEGER NOT NULL DEFAULT 0
);

-- Normalized events of a match
CREATE TABLE IF NOT EXISTS actions (
    move_number INTEGER NOT NULL,
    notation    TEXT,
    table_id    INTEGER NOT NULL REFERENCES matches(table_id),
    type        TEXT NOT NULL,
    type_copied TEXT,
    log         TEXT NOT NULL DEFAULT '',
    UNIQUE(move_number, table_id, type)
);

CREATE INDEX IF NOT EXISTS idx_actions_table_id ON actions (table_id);
"#;
