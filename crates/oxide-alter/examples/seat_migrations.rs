//! Example: Seating Schema Changes
//!
//! This example demonstrates how to use oxide-alter to reshape the tables
//! of a small seating application: a dropped column, a renamed foreign key
//! and a relaxed definition, followed by a rejected change.
//!
//! Run with: cargo run --example seat_migrations -p oxide-alter

use sqlx::{Connection, SqliteConnection};

use oxide_alter::prelude::*;

// =============================================================================
// Schema
// =============================================================================

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE "my_table" (
    "id" integer NOT NULL PRIMARY KEY,
    "name" varchar (20) NOT NULL DEFAULT "",
    "legacy_code" char(4)
)"#,
    r#"CREATE TABLE "my_seat" (
    "id" integer NOT NULL PRIMARY KEY,
    "table" integer NOT NULL REFERENCES "my_table" ("id"),
    "type" varchar(10) NOT NULL DEFAULT ""
)"#,
    "INSERT INTO my_table (id, name) VALUES (1, 'abc')",
    "INSERT INTO my_table (id, name) VALUES (2, 'def')",
    "INSERT INTO my_seat VALUES (1, 1, 'tall')",
    "INSERT INTO my_seat VALUES (2, 1, 'short')",
];

fn print_fields(mutator: &SchemaMutator) {
    println!("  Fields of {}:", mutator.table());
    for field in mutator.fields() {
        println!("    {field}");
    }
}

fn report(outcome: &Outcome) {
    let status = if outcome.is_success() { "ok" } else { "rejected" };
    println!("  [{status}] {outcome}");
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== oxide-alter Seating Example ===\n");

    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
    for sql in SCHEMA {
        sqlx::query(sql).execute(&mut conn).await?;
    }

    // -------------------------------------------------------------------------
    // my_table: drop an unused column, relax the name constraint
    // -------------------------------------------------------------------------
    println!("--- my_table ---\n");
    let mut tables = SchemaMutator::new(conn, "my_table").await?;
    print_fields(&tables);

    report(&tables.drop_column("legacy_code", true).await?);
    report(
        &tables
            .replace_definition("name", "varchar (20)", false)
            .await?,
    );
    print_fields(&tables);

    // -------------------------------------------------------------------------
    // my_seat: rename the foreign key column
    // -------------------------------------------------------------------------
    println!("\n--- my_seat ---\n");
    let mut seats = SchemaMutator::new(tables.into_connection(), "my_seat").await?;

    let rename = ColumnOperation::rename_column("table", "seat_table");
    println!("  Planned SQL:");
    if let Ok(statements) = seats.sql_for(&rename, false) {
        for sql in statements {
            println!("    {sql};");
        }
    }
    report(&seats.apply(&rename, false).await?);
    print_fields(&seats);

    // -------------------------------------------------------------------------
    // Rejections leave the database untouched
    // -------------------------------------------------------------------------
    println!("\n--- Rejections ---\n");
    report(&seats.drop_column("color", false).await?);
    report(
        &seats
            .replace_definition("type", "varchar(10) NOT NULL CHECK (type = 'tall')", false)
            .await?,
    );

    println!("\n=== Done ===");
    Ok(())
}
