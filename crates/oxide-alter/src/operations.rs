//! Column operations.
//!
//! Each operation turns the current [`FieldList`] into a [`MigrationPlan`]:
//! the field list of the new table plus the way rows are copied into it.
//! Planning is pure; nothing here touches the database.

use crate::dialect::CopyMode;
use crate::fields::{Field, FieldList};
use crate::outcome::{OperationKind, Rejection};

/// A column change that SQLite cannot express with `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOperation {
    /// Remove a column and its data.
    DropColumn {
        /// Column to drop.
        column: String,
    },

    /// Rename a column, keeping its definition.
    RenameColumn {
        /// Current column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Replace everything after the column name (type and constraints).
    ReplaceDefinition {
        /// Column to redefine.
        column: String,
        /// New definition, e.g. `varchar (20) NOT NULL`.
        definition: String,
    },
}

/// New field list and copy strategy for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Fields of the table after the change.
    pub fields: FieldList,
    /// How existing rows reach the new table.
    pub copy: CopyMode,
}

impl ColumnOperation {
    /// Creates a DropColumn operation.
    #[must_use]
    pub fn drop_column(column: impl Into<String>) -> Self {
        Self::DropColumn {
            column: column.into(),
        }
    }

    /// Creates a RenameColumn operation.
    #[must_use]
    pub fn rename_column(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::RenameColumn {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Creates a ReplaceDefinition operation.
    #[must_use]
    pub fn replace_definition(column: impl Into<String>, definition: impl Into<String>) -> Self {
        Self::ReplaceDefinition {
            column: column.into(),
            definition: definition.into(),
        }
    }

    /// Returns the kind of this operation.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::RenameColumn { .. } => OperationKind::RenameColumn,
            Self::ReplaceDefinition { .. } => OperationKind::ReplaceDefinition,
        }
    }

    /// Returns the column this operation targets.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::DropColumn { column } | Self::ReplaceDefinition { column, .. } => column,
            Self::RenameColumn { old_name, .. } => old_name,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::DropColumn { column } => format!("Drop column '{column}'"),
            Self::RenameColumn { old_name, new_name } => {
                format!("Rename column '{old_name}' to '{new_name}'")
            }
            Self::ReplaceDefinition { column, definition } => {
                format!("Replace definition of column '{column}' with '{definition}'")
            }
        }
    }

    /// The message reported once the operation has been applied.
    #[must_use]
    pub fn success_message(&self) -> String {
        match self {
            Self::DropColumn { column } => format!("Column '{column}' dropped."),
            Self::RenameColumn { old_name, new_name } => {
                format!("Column '{old_name}' renamed to '{new_name}'.")
            }
            Self::ReplaceDefinition { column, definition } => {
                format!("Changed the definition for column {column} to: {definition}")
            }
        }
    }

    /// Computes the new field list for `fields`.
    ///
    /// Fails with [`Rejection::NoSuchColumn`] when no column matches.
    pub fn plan(&self, fields: &FieldList) -> Result<MigrationPlan, Rejection> {
        match self {
            Self::DropColumn { column } => self.plan_drop(fields, column),
            Self::RenameColumn { old_name, new_name } => {
                let mut found = false;
                let renamed = fields
                    .iter()
                    .map(|field| match field.as_column() {
                        Some(def) if !found && def.is_named(old_name) => {
                            found = true;
                            Field::Column(def.renamed(new_name))
                        }
                        _ => field.clone(),
                    })
                    .collect();
                self.found(found)?;
                Ok(MigrationPlan {
                    fields: renamed,
                    copy: CopyMode::FullRow,
                })
            }
            Self::ReplaceDefinition { column, definition } => {
                let mut found = false;
                let replaced = fields
                    .iter()
                    .map(|field| match field {
                        Field::Column(def) if def.is_named(column) => {
                            found = true;
                            Field::Column(def.with_tail(definition))
                        }
                        Field::Column(def) => Field::Column(def.canonical()),
                        Field::Constraint { .. } => field.clone(),
                    })
                    .collect();
                self.found(found)?;
                Ok(MigrationPlan {
                    fields: replaced,
                    copy: CopyMode::FullRow,
                })
            }
        }
    }

    fn plan_drop(&self, fields: &FieldList, column: &str) -> Result<MigrationPlan, Rejection> {
        let mut kept = Vec::with_capacity(fields.len());
        let mut copied = Vec::with_capacity(fields.len());

        for field in fields {
            match field.as_column() {
                Some(def) if def.is_named(column) => {}
                Some(def) => {
                    copied.push(def.name().to_string());
                    kept.push(field.clone());
                }
                None => kept.push(field.clone()),
            }
        }

        self.found(kept.len() < fields.len())?;
        if copied.is_empty() {
            return Err(Rejection::LastColumn {
                column: column.to_string(),
            });
        }

        Ok(MigrationPlan {
            fields: FieldList::new(kept),
            copy: CopyMode::Projected(copied),
        })
    }

    fn found(&self, found: bool) -> Result<(), Rejection> {
        if found {
            Ok(())
        } else {
            Err(Rejection::NoSuchColumn {
                operation: self.kind(),
                column: self.column().to_string(),
            })
        }
    }
}
