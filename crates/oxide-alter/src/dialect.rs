//! SQLite statements for the table recreation protocol.
//!
//! SQLite has no `ALTER COLUMN` and (before 3.35.0) no `DROP COLUMN`, so a
//! column change is emulated: create a shadow table with the new column
//! set, copy the rows, then swap the shadow table in for the live one.

/// Suffix of the shadow table that stages a change.
pub const SHADOW_SUFFIX: &str = "_tmp";

/// Suffix of the table that keeps the pre-change data in safe mode.
pub const ARCHIVE_SUFFIX: &str = "_initial";

/// Quotes an identifier with double quotes, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Name of the shadow table for `table`.
#[must_use]
pub fn shadow_name(table: &str) -> String {
    format!("{table}{SHADOW_SUFFIX}")
}

/// Name of the archive table for `table`.
#[must_use]
pub fn archive_name(table: &str) -> String {
    format!("{table}{ARCHIVE_SUFFIX}")
}

/// How rows are copied from the live table into the shadow table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyMode {
    /// `INSERT OR ABORT INTO shadow (cols) SELECT cols FROM live`. Used when
    /// the column set shrinks.
    Projected(Vec<String>),
    /// `INSERT OR ABORT INTO shadow SELECT * FROM live`. Used when only names or
    /// definitions change and the physical column order is unchanged.
    FullRow,
}

/// SQLite statement generator.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates SQL for creating a table from raw field definitions.
    #[must_use]
    pub fn create_table_sql(
        &self,
        name: &str,
        definitions: &[&str],
        options: Option<&str>,
    ) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&quote_identifier(name));
        sql.push_str(" (\n    ");
        sql.push_str(&definitions.join(",\n    "));
        sql.push_str("\n)");
        if let Some(options) = options {
            sql.push(' ');
            sql.push_str(options);
        }
        sql
    }

    /// Generates SQL for copying rows from `source` into `target`.
    ///
    /// `OR ABORT` overrides any `ON CONFLICT` clause of the target's
    /// constraints: a conflicting row fails the statement instead of being
    /// skipped, merged or rolling back the enclosing transaction.
    #[must_use]
    pub fn copy_rows_sql(&self, source: &str, target: &str, mode: &CopyMode) -> String {
        match mode {
            CopyMode::Projected(columns) => {
                let columns = columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT OR ABORT INTO {} ({columns}) SELECT {columns} FROM {}",
                    quote_identifier(target),
                    quote_identifier(source)
                )
            }
            CopyMode::FullRow => format!(
                "INSERT OR ABORT INTO {} SELECT * FROM {}",
                quote_identifier(target),
                quote_identifier(source)
            ),
        }
    }

    /// Generates SQL for counting the rows of a table.
    #[must_use]
    pub fn count_rows_sql(&self, name: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_identifier(name))
    }

    /// Generates SQL for dropping a table.
    #[must_use]
    pub fn drop_table_sql(&self, name: &str, if_exists: bool) -> String {
        let mut sql = String::from("DROP TABLE ");
        if if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&quote_identifier(name));
        sql
    }

    /// Generates SQL for renaming a table.
    #[must_use]
    pub fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(old_name),
            quote_identifier(new_name)
        )
    }

    /// Generates the swap statements that replace `table` with its shadow.
    ///
    /// In safe mode the live table is kept as `<table>_initial`, otherwise it
    /// is dropped.
    #[must_use]
    pub fn swap_sql(&self, table: &str, safe: bool) -> Vec<String> {
        let displace = if safe {
            self.rename_table_sql(table, &archive_name(table))
        } else {
            self.drop_table_sql(table, false)
        };
        vec![displace, self.rename_table_sql(&shadow_name(table), table)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_create_table() {
        let sql = dialect().create_table_sql(
            "my_table_tmp",
            &["\"id\" integer NOT NULL PRIMARY KEY", "\"name\" varchar (20)"],
            None,
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"my_table_tmp\" (\n    \
             \"id\" integer NOT NULL PRIMARY KEY,\n    \
             \"name\" varchar (20)\n)"
        );
    }

    #[test]
    fn test_create_table_with_options() {
        let sql =
            dialect().create_table_sql("t", &["a INTEGER PRIMARY KEY"], Some("WITHOUT ROWID"));
        assert!(sql.ends_with(") WITHOUT ROWID"));
    }

    #[test]
    fn test_copy_projected() {
        let mode = CopyMode::Projected(vec!["id".to_string(), "type".to_string()]);
        let sql = dialect().copy_rows_sql("my_seat", "my_seat_tmp", &mode);
        assert_eq!(
            sql,
            "INSERT OR ABORT INTO \"my_seat_tmp\" (\"id\", \"type\") \
             SELECT \"id\", \"type\" FROM \"my_seat\""
        );
    }

    #[test]
    fn test_copy_full_row() {
        let sql = dialect().copy_rows_sql("t", "t_tmp", &CopyMode::FullRow);
        assert_eq!(sql, "INSERT OR ABORT INTO \"t_tmp\" SELECT * FROM \"t\"");
    }

    #[test]
    fn test_count_rows() {
        assert_eq!(dialect().count_rows_sql("t_tmp"), "SELECT COUNT(*) FROM \"t_tmp\"");
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(dialect().drop_table_sql("t", true), "DROP TABLE IF EXISTS \"t\"");
        assert_eq!(dialect().drop_table_sql("t", false), "DROP TABLE \"t\"");
    }

    #[test]
    fn test_swap_safe() {
        assert_eq!(
            dialect().swap_sql("users", true),
            vec![
                "ALTER TABLE \"users\" RENAME TO \"users_initial\"",
                "ALTER TABLE \"users_tmp\" RENAME TO \"users\"",
            ]
        );
    }

    #[test]
    fn test_swap_unsafe() {
        assert_eq!(
            dialect().swap_sql("users", false),
            vec!["DROP TABLE \"users\"", "ALTER TABLE \"users_tmp\" RENAME TO \"users\""]
        );
    }
}
