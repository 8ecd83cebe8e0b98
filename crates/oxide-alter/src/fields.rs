//! Column definitions as they appear in a `CREATE TABLE` body.
//!
//! SQLite keeps the original creation statement of every table in its
//! catalog. This module splits that statement into its top-level,
//! comma-separated fragments ("fields") and classifies each fragment as
//! either a column definition or a table-level constraint.
//!
//! Commas are only split at parenthesis depth zero and outside quoted
//! text, so `varchar (20)`, `DECIMAL(10, 2)`, `CHECK (x IN (1, 2))` and
//! `DEFAULT 'a,b'` all stay in one piece.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::dialect::quote_identifier;

/// Matches the whole creation statement and captures the table name, the
/// column body and any trailing table options.
static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*create\s+(?:temp(?:orary)?\s+)?table\s+(?:if\s+not\s+exists\s+)?(?:(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|\w+)\s*\.\s*)?(?P<name>"[^"]+"|'[^']+'|`[^`]+`|\[[^\]]+\]|\w+)\s*\((?P<body>.*)\)\s*(?P<options>(?:without\s+rowid|strict)(?:\s*,\s*(?:without\s+rowid|strict))*)?\s*;?\s*$"#,
    )
    .expect("invalid CREATE TABLE pattern")
});

/// Matches the leading identifier of a fragment, bare or quoted.
static LEADING_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^(?:"(?P<dq>(?:[^"]|"")+)"|'(?P<sq>[^']+)'|`(?P<bt>[^`]+)`|\[(?P<br>[^\]]+)\]|(?P<bare>\w+))(?P<rest>.*)$"#,
    )
    .expect("invalid identifier pattern")
});

/// Bare words that open a table constraint rather than a column.
const CONSTRAINT_KEYWORDS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

/// Error produced when a creation statement cannot be split.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Byte offset in the normalized (comment-free, single-line) statement.
    pub position: usize,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A column definition: leading identifier plus everything after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    name: String,
    /// Text after the identifier, leading whitespace included.
    #[serde(skip)]
    rest: String,
    text: String,
}

impl ColumnDef {
    /// The unquoted column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type and constraint text following the name.
    #[must_use]
    pub fn tail(&self) -> &str {
        self.rest.trim()
    }

    /// The definition exactly as it will be written into `CREATE TABLE`.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns true if this column is called `column`.
    ///
    /// SQLite identifiers are case-insensitive for ASCII letters.
    #[must_use]
    pub fn is_named(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
    }

    /// Returns this definition under a new, quoted name. The rest of the
    /// fragment is kept byte for byte.
    #[must_use]
    pub fn renamed(&self, new_name: &str) -> Self {
        Self {
            name: new_name.to_string(),
            rest: self.rest.clone(),
            text: format!("{}{}", quote_identifier(new_name), self.rest),
        }
    }

    /// Returns `"name" tail` with the given tail.
    #[must_use]
    pub fn with_tail(&self, tail: &str) -> Self {
        let tail = tail.trim();
        let tail = tail.strip_suffix(',').unwrap_or(tail).trim_end();
        let rest = if tail.is_empty() {
            String::new()
        } else {
            format!(" {tail}")
        };
        Self {
            name: self.name.clone(),
            text: format!("{}{}", quote_identifier(&self.name), rest),
            rest,
        }
    }

    /// Returns the definition rewritten as `"name" tail`.
    #[must_use]
    pub fn canonical(&self) -> Self {
        self.with_tail(self.tail())
    }
}

/// One top-level fragment of a `CREATE TABLE` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    /// A column definition.
    Column(ColumnDef),
    /// A table-level construct such as `FOREIGN KEY (...) REFERENCES ...`,
    /// carried through untouched.
    Constraint {
        /// Fragment text.
        text: String,
    },
}

impl Field {
    /// Classifies a single trimmed fragment.
    #[must_use]
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.trim();
        let Some(caps) = LEADING_IDENTIFIER.captures(fragment) else {
            return Self::Constraint {
                text: fragment.to_string(),
            };
        };

        let name = if let Some(bare) = caps.name("bare") {
            let word = bare.as_str();
            if CONSTRAINT_KEYWORDS
                .iter()
                .any(|kw| kw.eq_ignore_ascii_case(word))
            {
                return Self::Constraint {
                    text: fragment.to_string(),
                };
            }
            word.to_string()
        } else if let Some(dq) = caps.name("dq") {
            dq.as_str().replace("\"\"", "\"")
        } else {
            ["sq", "bt", "br"]
                .iter()
                .find_map(|group| caps.name(group))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Self::Column(ColumnDef {
            name,
            rest: caps["rest"].to_string(),
            text: fragment.to_string(),
        })
    }

    /// The fragment text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Column(column) => column.text(),
            Self::Constraint { text } => text,
        }
    }

    /// Returns the column definition, if this is one.
    #[must_use]
    pub fn as_column(&self) -> Option<&ColumnDef> {
        match self {
            Self::Column(column) => Some(column),
            Self::Constraint { .. } => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Ordered fields of one table. Order matches the physical column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldList(Vec<Field>);

impl FieldList {
    /// Creates a field list from already classified fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    /// Number of fragments, constraints included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no fragments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all fragments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    /// Iterates over the column definitions, skipping table constraints.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.0.iter().filter_map(Field::as_column)
    }

    /// Finds a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns().find(|c| c.is_named(name))
    }

    /// Column names in physical order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(ColumnDef::name).collect()
    }

    /// Fragment texts in order, ready to be joined into a table body.
    #[must_use]
    pub fn definitions(&self) -> Vec<&str> {
        self.0.iter().map(Field::text).collect()
    }
}

impl FromIterator<Field> for FieldList {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A parsed `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Unquoted table name as written in the statement.
    pub name: String,
    /// Top-level fragments of the body.
    pub fields: FieldList,
    /// Trailing table options such as `WITHOUT ROWID` or `STRICT`.
    pub options: Option<String>,
}

impl TableDefinition {
    /// Parses a creation statement as stored in `sqlite_master.sql`.
    pub fn parse(creation_sql: &str) -> Result<Self, ParseError> {
        let inline = strip_comments(creation_sql)?.replace(['\r', '\n'], " ");

        let caps = CREATE_TABLE
            .captures(&inline)
            .ok_or_else(|| ParseError::new("expected CREATE TABLE <name> (...)", 0))?;

        let body = caps
            .name("body")
            .ok_or_else(|| ParseError::new("missing column list", 0))?;
        let fields = split_top_level(body.as_str(), body.start())?
            .iter()
            .map(|fragment| Field::parse(fragment))
            .collect();

        Ok(Self {
            name: unquote(&caps["name"]),
            fields,
            options: caps
                .name("options")
                .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ")),
        })
    }
}

/// Splits a creation statement into its field fragments, in order.
pub fn split_fields(creation_sql: &str) -> Result<Vec<String>, ParseError> {
    Ok(TableDefinition::parse(creation_sql)?
        .fields
        .iter()
        .map(|field| field.text().to_string())
        .collect())
}

fn closing_quote(c: char) -> Option<char> {
    match c {
        '\'' | '"' | '`' => Some(c),
        '[' => Some(']'),
        _ => None,
    }
}

fn unquote(identifier: &str) -> String {
    let mut chars = identifier.chars();
    match (chars.next(), identifier.chars().last()) {
        (Some(open), Some(close))
            if identifier.len() > 1 && closing_quote(open) == Some(close) =>
        {
            identifier[1..identifier.len() - 1].to_string()
        }
        _ => identifier.to_string(),
    }
}

/// Removes `-- line` and `/* block */` comments that are not inside quotes.
fn strip_comments(sql: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut quote: Option<(char, usize)> = None;

    while let Some((pos, c)) = chars.next() {
        if let Some((close, _)) = quote {
            out.push(c);
            if c == close {
                quote = None;
            }
            continue;
        }

        match c {
            '-' if chars.peek().is_some_and(|&(_, next)| next == '-') => {
                for (_, skipped) in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek().is_some_and(|&(_, next)| next == '*') => {
                chars.next();
                let mut closed = false;
                while let Some((_, skipped)) = chars.next() {
                    if skipped == '*' && chars.peek().is_some_and(|&(_, next)| next == '/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(ParseError::new("unterminated block comment", pos));
                }
                out.push(' ');
            }
            _ => {
                if let Some(close) = closing_quote(c) {
                    quote = Some((close, pos));
                }
                out.push(c);
            }
        }
    }

    match quote {
        Some((_, pos)) => Err(ParseError::new("unterminated quoted text", pos)),
        None => Ok(out),
    }
}

/// Splits `body` on commas at parenthesis depth zero.
///
/// `offset` is the position of `body` within the statement, used for errors.
fn split_top_level(body: &str, offset: usize) -> Result<Vec<String>, ParseError> {
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (pos, c) in body.char_indices() {
        if let Some(close) = quote {
            if c == close {
                quote = None;
            }
            continue;
        }

        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::new("unbalanced ')'", offset + pos))?;
            }
            ',' if depth == 0 => {
                fragments.push(fragment(body, start, pos, offset)?);
                start = pos + 1;
            }
            _ => quote = closing_quote(c),
        }
    }

    if depth > 0 {
        return Err(ParseError::new("unclosed '('", offset + body.len()));
    }
    fragments.push(fragment(body, start, body.len(), offset)?);
    Ok(fragments)
}

fn fragment(body: &str, start: usize, end: usize, offset: usize) -> Result<String, ParseError> {
    let text = body[start..end].trim();
    if text.is_empty() {
        return Err(ParseError::new("empty column definition", offset + start));
    }
    Ok(text.to_string())
}
