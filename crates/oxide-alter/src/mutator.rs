//! Schema mutator.
//!
//! This module applies column operations to one table using the table
//! recreation protocol:
//!
//! 1. **Create** the shadow table `<table>_tmp` with the new field list.
//! 2. **Populate** it from the live table.
//! 3. **Swap**: archive (`safe`) or drop the live table, then rename the
//!    shadow table to the live name.
//!
//! The three phases run in a single transaction, so a failure at any point
//! leaves the live table as it was and no shadow table behind.

use std::path::Path;

use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info, warn};

use crate::catalog;
use crate::dialect::{shadow_name, SqliteDialect};
use crate::error::{AlterError, Result};
use crate::fields::{FieldList, TableDefinition};
use crate::operations::{ColumnOperation, MigrationPlan};
use crate::outcome::{Outcome, Rejection};

/// Primary result code of every `SQLITE_CONSTRAINT_*` extended code.
const SQLITE_CONSTRAINT: i32 = 19;

/// Connection settings required by the swap phase.
///
/// `legacy_alter_table` keeps `ALTER TABLE ... RENAME` from rewriting
/// foreign keys in other tables to point at the archived table, and with
/// foreign keys off dropping a referenced table does not cascade.
const CONNECTION_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = OFF",
    "PRAGMA legacy_alter_table = ON",
];

/// SQL of one protocol run.
struct ProtocolSql {
    create: String,
    populate: String,
    count_source: String,
    count_shadow: String,
    discard: String,
    swap: Vec<String>,
}

/// Drops, renames and redefines columns of one table.
///
/// The mutator owns its connection for its whole lifetime. Its field list
/// always describes the live table on disk: it is only replaced once a
/// migration has been committed.
pub struct SchemaMutator {
    conn: SqliteConnection,
    dialect: SqliteDialect,
    table: String,
    creation_sql: String,
    definition: TableDefinition,
}

impl SchemaMutator {
    /// Opens the database file at `path` and loads `table`.
    ///
    /// The file must already exist.
    pub async fn open(path: impl AsRef<Path>, table: impl Into<String>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);
        Self::connect_with(&options, table).await
    }

    /// Connects with the given options and loads `table`.
    pub async fn connect_with(
        options: &SqliteConnectOptions,
        table: impl Into<String>,
    ) -> Result<Self> {
        let conn = options.connect().await?;
        Self::new(conn, table).await
    }

    /// Loads `table` through an existing connection.
    ///
    /// Reads the creation SQL from the catalog and splits it into fields.
    pub async fn new(mut conn: SqliteConnection, table: impl Into<String>) -> Result<Self> {
        let table = table.into();

        for pragma in CONNECTION_PRAGMAS {
            sqlx::query(*pragma).execute(&mut conn).await?;
        }

        let creation_sql = catalog::creation_sql(&mut conn, &table)
            .await?
            .ok_or_else(|| AlterError::TableNotFound(table.clone()))?;

        let definition = TableDefinition::parse(&creation_sql).map_err(|source| {
            AlterError::Parse {
                table: table.clone(),
                source,
            }
        })?;

        let shadow = shadow_name(&table);
        if catalog::table_exists(&mut conn, &shadow).await? {
            warn!(
                table = %table,
                shadow = %shadow,
                "Orphaned shadow table found; operations will fail until it is discarded"
            );
        }

        debug!(table = %table, fields = definition.fields.len(), "Loaded table definition");

        Ok(Self {
            conn,
            dialect: SqliteDialect::new(),
            table,
            creation_sql,
            definition,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the creation SQL of the live table, as stored in the catalog.
    #[must_use]
    pub fn creation_sql(&self) -> &str {
        &self.creation_sql
    }

    /// Returns the current field list.
    #[must_use]
    pub fn fields(&self) -> &FieldList {
        &self.definition.fields
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Consumes the mutator and returns its connection.
    #[must_use]
    pub fn into_connection(self) -> SqliteConnection {
        self.conn
    }

    /// Drops `column`.
    pub async fn drop_column(&mut self, column: &str, safe: bool) -> Result<Outcome> {
        self.apply(&ColumnOperation::drop_column(column), safe).await
    }

    /// Renames `old_name` to `new_name`.
    pub async fn rename_column(
        &mut self,
        old_name: &str,
        new_name: &str,
        safe: bool,
    ) -> Result<Outcome> {
        self.apply(&ColumnOperation::rename_column(old_name, new_name), safe)
            .await
    }

    /// Replaces the type and constraints of `column` with `definition`.
    pub async fn replace_definition(
        &mut self,
        column: &str,
        definition: &str,
        safe: bool,
    ) -> Result<Outcome> {
        self.apply(
            &ColumnOperation::replace_definition(column, definition),
            safe,
        )
        .await
    }

    /// Applies a column operation.
    ///
    /// Expected failures (unknown column, data rejected by a new constraint,
    /// a definition SQLite refuses) come back as [`Outcome::Rejected`] with
    /// the database untouched. Other database errors are returned as `Err`
    /// after the transaction has been rolled back.
    pub async fn apply(&mut self, operation: &ColumnOperation, safe: bool) -> Result<Outcome> {
        info!(
            table = %self.table,
            operation = %operation.description(),
            safe,
            "Applying column operation"
        );

        let plan = match operation.plan(&self.definition.fields) {
            Ok(plan) => plan,
            Err(rejection) => return Ok(self.reject(rejection)),
        };

        self.migrate(operation, plan, safe).await
    }

    /// Returns the statements `apply` would execute to change the schema,
    /// without executing them. Row count checks are left out.
    pub fn sql_for(
        &self,
        operation: &ColumnOperation,
        safe: bool,
    ) -> std::result::Result<Vec<String>, Rejection> {
        let plan = operation.plan(&self.definition.fields)?;
        let sql = self.protocol_sql(&plan, safe);
        Ok([sql.create, sql.populate].into_iter().chain(sql.swap).collect())
    }

    /// Checks if a shadow table from an interrupted run exists.
    pub async fn has_orphaned_shadow(&mut self) -> Result<bool> {
        catalog::table_exists(&mut self.conn, &shadow_name(&self.table)).await
    }

    /// Drops an orphaned shadow table. Returns whether one was dropped.
    pub async fn discard_orphaned_shadow(&mut self) -> Result<bool> {
        if !self.has_orphaned_shadow().await? {
            return Ok(false);
        }

        let shadow = shadow_name(&self.table);
        warn!(table = %self.table, shadow = %shadow, "Dropping orphaned shadow table");
        sqlx::query(&self.dialect.drop_table_sql(&shadow, false))
            .execute(&mut self.conn)
            .await?;
        Ok(true)
    }

    fn protocol_sql(&self, plan: &MigrationPlan, safe: bool) -> ProtocolSql {
        let shadow = shadow_name(&self.table);
        ProtocolSql {
            create: self.dialect.create_table_sql(
                &shadow,
                &plan.fields.definitions(),
                self.definition.options.as_deref(),
            ),
            populate: self.dialect.copy_rows_sql(&self.table, &shadow, &plan.copy),
            count_source: self.dialect.count_rows_sql(&self.table),
            count_shadow: self.dialect.count_rows_sql(&shadow),
            discard: self.dialect.drop_table_sql(&shadow, true),
            swap: self.dialect.swap_sql(&self.table, safe),
        }
    }

    fn reject(&self, rejection: Rejection) -> Outcome {
        warn!(table = %self.table, reason = %rejection, "Column operation rejected");
        Outcome::rejected(rejection)
    }

    async fn migrate(
        &mut self,
        operation: &ColumnOperation,
        plan: MigrationPlan,
        safe: bool,
    ) -> Result<Outcome> {
        let sql = self.protocol_sql(&plan, safe);
        let mut tx = self.conn.begin().await?;

        debug!(phase = "create", sql = %sql.create, "Executing SQL");
        if let Err(err) = sqlx::query(&sql.create).execute(&mut *tx).await {
            tx.rollback().await?;
            return match err {
                sqlx::Error::Database(db) => Ok(self.reject(Rejection::InvalidDefinition {
                    table: shadow_name(&self.table),
                    detail: db.message().to_string(),
                })),
                other => Err(other.into()),
            };
        }

        let (expected,): (i64,) = sqlx::query_as(&sql.count_source)
            .fetch_one(&mut *tx)
            .await?;

        debug!(phase = "populate", sql = %sql.populate, "Executing SQL");
        let detail = match sqlx::query(&sql.populate).execute(&mut *tx).await {
            Ok(result) => {
                debug!(rows = result.rows_affected(), "Copied rows into shadow table");
                let (copied,): (i64,) = sqlx::query_as(&sql.count_shadow)
                    .fetch_one(&mut *tx)
                    .await?;
                (copied != expected).then(|| format!("copied {copied} of {expected} rows"))
            }
            Err(err) if is_integrity_violation(&err) => Some(engine_message(&err)),
            Err(err) => {
                tx.rollback().await?;
                return Err(err.into());
            }
        };

        if let Some(detail) = detail {
            debug!(phase = "populate", sql = %sql.discard, "Executing SQL");
            sqlx::query(&sql.discard).execute(&mut *tx).await?;
            tx.rollback().await?;
            return Ok(self.reject(Rejection::IntegrityViolation {
                operation: operation.kind(),
                column: operation.column().to_string(),
                detail,
            }));
        }

        for statement in &sql.swap {
            debug!(phase = "swap", sql = %statement, "Executing SQL");
            if let Err(err) = sqlx::query(statement).execute(&mut *tx).await {
                tx.rollback().await?;
                return Err(err.into());
            }
        }

        tx.commit().await?;

        if let Some(creation_sql) = catalog::creation_sql(&mut self.conn, &self.table).await? {
            self.creation_sql = creation_sql;
        }
        self.definition.fields = plan.fields.clone();

        let message = operation.success_message();
        info!(table = %self.table, safe, "{}", message);

        Ok(Outcome::Applied {
            message,
            fields: plan.fields,
        })
    }
}

impl std::fmt::Debug for SchemaMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaMutator")
            .field("table", &self.table)
            .field("fields", &self.definition.fields)
            .finish_non_exhaustive()
    }
}

/// Returns true if `err` is SQLite rejecting data on a constraint.
fn is_integrity_violation(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };

    matches!(
        db.kind(),
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    ) || db
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| code & 0xff == SQLITE_CONSTRAINT)
}

fn engine_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_conn() -> SqliteConnection {
        let mut conn = SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite database");
        for sql in [
            "CREATE TABLE \"my_table\" (\n    \"id\" integer NOT NULL PRIMARY KEY,\n    \"name\" varchar (20) NOT NULL DEFAULT \"\"\n)",
            "INSERT INTO my_table (id, name) VALUES (1, 'abc')",
            "INSERT INTO my_table (id, name) VALUES (2, 'def')",
        ] {
            sqlx::query(sql).execute(&mut conn).await.unwrap();
        }
        conn
    }

    async fn tables(conn: &mut SqliteConnection) -> Vec<String> {
        sqlx::query_as::<_, (String,)>(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(conn)
        .await
        .unwrap()
        .into_iter()
        .map(|(name,)| name)
        .collect()
    }

    #[tokio::test]
    async fn test_new_loads_fields() {
        let mutator = SchemaMutator::new(create_test_conn().await, "my_table")
            .await
            .unwrap();
        assert_eq!(mutator.table(), "my_table");
        assert_eq!(mutator.fields().column_names(), vec!["id", "name"]);
        assert!(mutator.creation_sql().starts_with("CREATE TABLE \"my_table\""));
    }

    #[tokio::test]
    async fn test_new_unknown_table() {
        let result = SchemaMutator::new(create_test_conn().await, "nope").await;
        assert!(matches!(result, Err(AlterError::TableNotFound(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn test_sql_for_does_not_touch_disk() {
        let mut mutator = SchemaMutator::new(create_test_conn().await, "my_table")
            .await
            .unwrap();

        let sql = mutator
            .sql_for(&ColumnOperation::drop_column("name"), true)
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"my_table_tmp\" (\n    \"id\" integer NOT NULL PRIMARY KEY\n)",
                "INSERT OR ABORT INTO \"my_table_tmp\" (\"id\") SELECT \"id\" FROM \"my_table\"",
                "ALTER TABLE \"my_table\" RENAME TO \"my_table_initial\"",
                "ALTER TABLE \"my_table_tmp\" RENAME TO \"my_table\"",
            ]
        );
        assert_eq!(tables(mutator.connection()).await, vec!["my_table"]);

        let rejection = mutator
            .sql_for(&ColumnOperation::drop_column("nope"), true)
            .unwrap_err();
        assert_eq!(rejection.to_string(), "No such column: 'nope'");
    }

    #[tokio::test]
    async fn test_fields_refresh_after_apply() {
        let mut mutator = SchemaMutator::new(create_test_conn().await, "my_table")
            .await
            .unwrap();

        let outcome = mutator.drop_column("name", false).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(mutator.fields().column_names(), vec!["id"]);
        assert!(mutator.creation_sql().contains("\"my_table\""));
        assert!(!mutator.creation_sql().contains("\"name\""));
    }

    #[tokio::test]
    async fn test_orphaned_shadow_cleanup() {
        let mut conn = create_test_conn().await;
        sqlx::query("CREATE TABLE \"my_table_tmp\" (\"id\" integer)")
            .execute(&mut conn)
            .await
            .unwrap();

        let mut mutator = SchemaMutator::new(conn, "my_table").await.unwrap();
        assert!(mutator.has_orphaned_shadow().await.unwrap());

        // The leftover shadow blocks the create phase.
        let outcome = mutator.drop_column("name", false).await.unwrap();
        assert!(matches!(
            outcome.rejection(),
            Some(Rejection::InvalidDefinition { .. })
        ));
        assert!(outcome.message().contains("already exists"));

        assert!(mutator.discard_orphaned_shadow().await.unwrap());
        assert!(!mutator.discard_orphaned_shadow().await.unwrap());
        assert!(mutator.drop_column("name", false).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected() {
        let mut mutator = SchemaMutator::new(create_test_conn().await, "my_table")
            .await
            .unwrap();

        let outcome = mutator
            .replace_definition("name", "varchar (20) NOT NULL DEFAULT (", false)
            .await
            .unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.message().starts_with("Could not create table 'my_table_tmp'"));
        assert_eq!(tables(mutator.connection()).await, vec!["my_table"]);
    }

    #[tokio::test]
    async fn test_swap_failure_rolls_back() {
        let mut conn = create_test_conn().await;
        sqlx::query("CREATE TABLE \"my_table_initial\" (\"id\" integer)")
            .execute(&mut conn)
            .await
            .unwrap();

        let mut mutator = SchemaMutator::new(conn, "my_table").await.unwrap();
        let result = mutator.drop_column("name", true).await;
        assert!(matches!(result, Err(AlterError::Database(_))));

        // Live table and in-memory fields are unchanged, no shadow left.
        assert_eq!(mutator.fields().column_names(), vec!["id", "name"]);
        assert_eq!(
            tables(mutator.connection()).await,
            vec!["my_table", "my_table_initial"]
        );
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM my_table")
            .fetch_one(mutator.connection())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_is_integrity_violation() {
        let mut conn = create_test_conn().await;
        let err = sqlx::query("INSERT INTO my_table (id, name) VALUES (3, NULL)")
            .execute(&mut conn)
            .await
            .unwrap_err();
        assert!(is_integrity_violation(&err));

        let err = sqlx::query("INSERT INTO missing VALUES (1)")
            .execute(&mut conn)
            .await
            .unwrap_err();
        assert!(!is_integrity_violation(&err));
    }
}
