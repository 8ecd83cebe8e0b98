//! Results of column operations.
//!
//! Every operation answers with a success flag and a human-readable
//! message. [`Outcome`] carries that pair in typed form.

use std::fmt;

use serde::Serialize;

use crate::fields::FieldList;

/// Which column operation produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `drop_column`
    DropColumn,
    /// `rename_column`
    RenameColumn,
    /// `replace_definition`
    ReplaceDefinition,
}

/// Why an operation left the database untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// The requested column is not in the table.
    NoSuchColumn {
        /// Operation that was attempted.
        operation: OperationKind,
        /// Column name as given by the caller.
        column: String,
    },

    /// Copying the existing rows into the new table violated a constraint.
    IntegrityViolation {
        /// Operation that was attempted.
        operation: OperationKind,
        /// Column the operation targeted.
        column: String,
        /// Engine message.
        detail: String,
    },

    /// Dropping the column would leave the table without columns.
    LastColumn {
        /// Column that was to be dropped.
        column: String,
    },

    /// SQLite refused to create the new table.
    InvalidDefinition {
        /// Name of the table that could not be created.
        table: String,
        /// Engine message.
        detail: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchColumn {
                operation: OperationKind::ReplaceDefinition,
                column,
            } => write!(f, "No such column: {column}"),
            Self::NoSuchColumn { column, .. } => write!(f, "No such column: '{column}'"),
            Self::IntegrityViolation {
                operation: OperationKind::ReplaceDefinition,
                column,
                detail,
            } => write!(
                f,
                "The definition supplied for column '{column}' raises an integrity error \
                 when SQLite copies the data from the original table to the new table \
                 (for example a NOT NULL constraint on a column that already holds null \
                 values). Please check the definition and/or the existing data in the \
                 original table. ({detail})"
            ),
            Self::IntegrityViolation { column, detail, .. } => write!(
                f,
                "Copying the data for column '{column}' into the new table raised an \
                 integrity error; the original table was left unchanged. ({detail})"
            ),
            Self::LastColumn { column } => write!(
                f,
                "Cannot drop column '{column}': a table must keep at least one column"
            ),
            Self::InvalidDefinition { table, detail } => {
                write!(f, "Could not create table '{table}': {detail}")
            }
        }
    }
}

/// Result of a column operation that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The table now has the new column set.
    Applied {
        /// Summary of the change.
        message: String,
        /// Field list of the table after the change.
        fields: FieldList,
    },
    /// Nothing on disk changed.
    Rejected {
        /// Why the operation was rejected.
        #[serde(flatten)]
        rejection: Rejection,
        /// Rendered message.
        message: String,
    },
}

impl Outcome {
    pub(crate) fn rejected(rejection: Rejection) -> Self {
        Self::Rejected {
            message: rejection.to_string(),
            rejection,
        }
    }

    /// Returns true if the change was applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Applied { message, .. } | Self::Rejected { message, .. } => message,
        }
    }

    /// Returns the rejection, if any.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Applied { .. } => None,
            Self::Rejected { rejection, .. } => Some(rejection),
        }
    }

    /// Converts into the plain `(success, message)` pair.
    #[must_use]
    pub fn into_pair(self) -> (bool, String) {
        match self {
            Self::Applied { message, .. } => (true, message),
            Self::Rejected { message, .. } => (false, message),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_column_messages() {
        let drop = Rejection::NoSuchColumn {
            operation: OperationKind::DropColumn,
            column: "name".to_string(),
        };
        assert_eq!(drop.to_string(), "No such column: 'name'");

        let replace = Rejection::NoSuchColumn {
            operation: OperationKind::ReplaceDefinition,
            column: "name".to_string(),
        };
        assert_eq!(replace.to_string(), "No such column: name");
    }

    #[test]
    fn test_rejected_outcome_pair() {
        let outcome = Outcome::rejected(Rejection::InvalidDefinition {
            table: "t_tmp".to_string(),
            detail: "near \"blah\": syntax error".to_string(),
        });
        assert!(!outcome.is_success());
        assert!(outcome.rejection().is_some());
        assert_eq!(
            outcome.into_pair(),
            (
                false,
                "Could not create table 't_tmp': near \"blah\": syntax error".to_string()
            )
        );
    }

    #[test]
    fn test_integrity_message_names_column() {
        let rejection = Rejection::IntegrityViolation {
            operation: OperationKind::ReplaceDefinition,
            column: "id".to_string(),
            detail: "NOT NULL constraint failed: t_tmp.id".to_string(),
        };
        let message = rejection.to_string();
        assert!(message.contains("'id'"));
        assert!(message.contains("NOT NULL constraint failed"));
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = Outcome::rejected(Rejection::NoSuchColumn {
            operation: OperationKind::DropColumn,
            column: "x".to_string(),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "no_such_column");
        assert_eq!(json["message"], "No such column: 'x'");
    }
}
