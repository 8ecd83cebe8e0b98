//! Column alterations for SQLite.
//!
//! `oxide-alter` drops, renames and redefines columns of an existing SQLite
//! table, including on engines without `ALTER TABLE ... DROP COLUMN` or any
//! form of `ALTER COLUMN`. It works on the table's own creation statement:
//!
//! - The creation SQL is read from `sqlite_master` and split into fields
//!   (column definitions and table constraints).
//! - A shadow table `<table>_tmp` is created with the modified field list,
//!   the rows are copied over, and the shadow table replaces the original.
//! - In safe mode the original table is kept as `<table>_initial`.
//!
//! # Architecture
//!
//! - **Fields** - Splits a `CREATE TABLE` statement into [`FieldList`]
//! - **Operations** - Plans drop/rename/replace on a field list
//! - **Dialect** - SQLite statements for the create/copy/swap protocol
//! - **Mutator** - Runs the protocol against a live connection
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_alter::prelude::*;
//!
//! let mut mutator = SchemaMutator::open("db.sqlite3", "my_table").await?;
//!
//! let outcome = mutator.drop_column("name", false).await?;
//! println!("{}", outcome.message()); // Column 'name' dropped.
//!
//! let outcome = mutator.replace_definition("id", "integer NOT NULL", true).await?;
//! if !outcome.is_success() {
//!     eprintln!("{outcome}");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Drop the 'name' column
//! oxide-alter -d db.sqlite3 my_table drop-column name
//!
//! # Rename a column, keeping the original table as my_table_initial
//! oxide-alter -d db.sqlite3 my_table rename-column name first_name --safe
//!
//! # Allow the 'name' column to be null
//! oxide-alter -d db.sqlite3 my_table replace-definition name varchar '(20)'
//! ```

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod fields;
pub mod mutator;
pub mod operations;
pub mod outcome;

pub use fields::{split_fields, ParseError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{CopyMode, SqliteDialect};
    pub use crate::error::{AlterError, Result};
    pub use crate::fields::{ColumnDef, Field, FieldList, TableDefinition};
    pub use crate::mutator::SchemaMutator;
    pub use crate::operations::{ColumnOperation, MigrationPlan};
    pub use crate::outcome::{OperationKind, Outcome, Rejection};
}
