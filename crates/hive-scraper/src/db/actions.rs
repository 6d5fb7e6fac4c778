use hive_core::{Action, ActionKind};
use sqlx::{SqliteConnection, SqlitePool};

/// Insert or update actions of one match. Rows are keyed by
/// (move_number, table_id, type), so repeating a call changes nothing. Rows
/// not in `actions` are left in place; see [`delete_actions`].
pub async fn upsert_actions(
    conn: &mut SqliteConnection,
    table_id: i64,
    actions: &[Action],
) -> Result<(), sqlx::Error> {
    for action in actions {
        sqlx::query(
            r#"INSERT INTO actions (move_number, notation, table_id, type, type_copied, log)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT (move_number, table_id, type) DO UPDATE SET
                   notation = excluded.notation,
                   type_copied = excluded.type_copied,
                   log = excluded.log"#,
        )
        .bind(action.move_number)
        .bind(action.notation.as_deref())
        .bind(table_id)
        .bind(action.kind.as_str())
        .bind(action.type_copied.as_deref())
        .bind(&action.log)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn delete_actions(conn: &mut SqliteConnection, table_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM actions WHERE table_id = ?1")
        .bind(table_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Actions of a match by move number; within a move, notated actions come
/// before bare markers.
pub async fn ordered_actions(pool: &SqlitePool, table_id: i64) -> Result<Vec<Action>, sqlx::Error> {
    let rows: Vec<(i64, Option<String>, String, Option<String>, String)> = sqlx::query_as(
        r#"SELECT move_number, notation, type, type_copied, log FROM actions
           WHERE table_id = ?1
           ORDER BY move_number ASC, notation DESC"#,
    )
    .bind(table_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(move_number, notation, type_str, type_copied, log)| {
            let Some(kind) = ActionKind::parse(&type_str) else {
                tracing::warn!(table_id, move_number, action_type = %type_str, "Unknown stored action type");
                return None;
            };
            Some(Action {
                move_number,
                kind,
                notation,
                type_copied,
                log,
            })
        })
        .collect())
}
