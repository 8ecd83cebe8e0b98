#![allow(dead_code)]

use std::path::PathBuf;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

pub const MY_TABLE: &str = r#"
CREATE TABLE "my_table" (
    "id" integer NOT NULL PRIMARY KEY,
    "name" varchar (20) NOT NULL DEFAULT ""
)"#;

pub const MY_SEAT: &str = r#"
CREATE TABLE "my_seat" (
    "id" integer NOT NULL PRIMARY KEY,
    "table" integer NOT NULL REFERENCES "my_table" ("id"),
    "type" varchar(10) NOT NULL DEFAULT ""
)"#;

const SEED: &[&str] = &[
    MY_TABLE,
    MY_SEAT,
    "INSERT INTO my_table (id, name) VALUES (1, 'abc')",
    "INSERT INTO my_table (id, name) VALUES (2, 'def')",
    "INSERT INTO my_seat VALUES (1, 1, 'tall')",
    "INSERT INTO my_seat VALUES (2, 1, 'short')",
];

/// A seeded database file that lives as long as this value.
pub struct TestDb {
    dir: TempDir,
    pub path: PathBuf,
}

pub async fn execute_all(conn: &mut SqliteConnection, statements: &[&str]) {
    for sql in statements {
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
    }
}

/// In-memory database with `my_table` and `my_seat`.
pub async fn seeded_memory() -> SqliteConnection {
    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");
    execute_all(&mut conn, SEED).await;
    conn
}

/// Database file with `my_table` and `my_seat`.
pub async fn seeded_file() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("testdb.sqlite3");

    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .expect("Failed to create database file");
    execute_all(&mut conn, SEED).await;
    conn.close().await.expect("Failed to close seeding connection");

    TestDb { dir, path }
}

pub async fn table_names(conn: &mut SqliteConnection) -> Vec<String> {
    sqlx::query_as::<_, (String,)>(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(conn)
    .await
    .expect("Failed to list tables")
    .into_iter()
    .map(|(name,)| name)
    .collect()
}

pub async fn row_count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to count rows of {table}: {e}"));
    count
}

/// Column names as SQLite itself reports them.
pub async fn column_names(conn: &mut SqliteConnection, table: &str) -> Vec<String> {
    sqlx::query_as::<_, (String,)>("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to read columns of {table}: {e}"))
        .into_iter()
        .map(|(name,)| name)
        .collect()
}

pub async fn ids(conn: &mut SqliteConnection, table: &str) -> Vec<i64> {
    sqlx::query_as::<_, (i64,)>(&format!("SELECT \"id\" FROM \"{table}\" ORDER BY \"id\""))
        .fetch_all(conn)
        .await
        .unwrap_or_else(|e| panic!("Failed to read ids of {table}: {e}"))
        .into_iter()
        .map(|(id,)| id)
        .collect()
}
