use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Record that `player_id`'s history was searched at `at`.
pub async fn mark_player_seen(
    pool: &SqlitePool,
    player_id: &str,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO players (player_id, last_search_timestamp) VALUES (?1, ?2)
           ON CONFLICT (player_id) DO UPDATE SET
               last_search_timestamp = excluded.last_search_timestamp"#,
    )
    .bind(player_id)
    .bind(at.timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn last_seen(pool: &SqlitePool, player_id: &str) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT last_search_timestamp FROM players WHERE player_id = ?1")
            .bind(player_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0))
}
