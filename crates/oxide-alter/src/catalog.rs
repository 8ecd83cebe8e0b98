//! Schema catalog lookups.
//!
//! Reads `sqlite_master`, where SQLite stores the original `CREATE TABLE`
//! text of every table.

use sqlx::SqliteConnection;

use crate::error::Result;

/// SQL that fetches the creation statement of a table.
///
/// Index rows share `tbl_name` with their table and carry a NULL `sql` for
/// automatic indexes, so only `table` rows are considered.
pub const CREATION_SQL_QUERY: &str =
    "SELECT sql FROM sqlite_master WHERE type = 'table' AND tbl_name = ?";

/// Returns the creation SQL of `table`.
///
/// Returns `None` unless the catalog holds exactly one table row with
/// non-NULL SQL for that name.
pub async fn creation_sql(conn: &mut SqliteConnection, table: &str) -> Result<Option<String>> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(CREATION_SQL_QUERY)
        .bind(table)
        .fetch_all(conn)
        .await?;

    match rows.as_slice() {
        [(Some(sql),)] if !sql.trim().is_empty() => Ok(Some(sql.clone())),
        _ => Ok(None),
    }
}

/// Checks if a table with this exact name exists.
pub async fn table_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_all(conn)
            .await?;

    Ok(!rows.is_empty())
}
