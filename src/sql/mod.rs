//! SQL Building
//!
//! This module turns caller-supplied names and values into SQL text.
//!
//! # Safety Rules
//! - Table and column names are parsed into [`Identifier`]s and always rendered double-quoted
//! - Values never appear in SQL text; they travel as [`Command`] arguments bound to `$n`
//! - Column definitions are kept verbatim but may not contain statement separators or comments
//! - Catalog lookups take names as bound parameters
//!
//! Every operation builds a fresh [`Command`]; nothing is shared between calls.

use std::fmt;

use crate::error::{ClientError, Result};

/// Longest identifier `PostgreSQL` keeps without truncation (`NAMEDATALEN - 1`)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Column written by `insert_data`
pub const DATA_COLUMN: &str = "data";

/// Keywords that start a table constraint rather than a column definition
const TABLE_CONSTRAINT_KEYWORDS: &[&str] =
    &["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN", "EXCLUDE"];

/// Current schema of the session
pub const CURRENT_SCHEMA: &str = "SELECT current_schema()";

/// Base tables of a schema (`$1` = schema)
pub const LIST_TABLES: &str = "
    SELECT table_name
    FROM information_schema.tables
    WHERE table_schema = $1
    AND table_type = 'BASE TABLE'
    ORDER BY table_name";

/// Existence check (`$1` = schema, `$2` = table)
pub const TABLE_EXISTS: &str = "
    SELECT COUNT(*)
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_name = $2";

/// Column listing (`$1` = schema, `$2` = table)
pub const DESCRIBE_COLUMNS: &str = "
    SELECT column_name, data_type, is_nullable, column_default
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position";

/// A validated SQL identifier
///
/// Unquoted input is folded to lower case the way the server folds unquoted names;
/// double-quoted input keeps its case. [`Display`](fmt::Display) always renders the
/// quoted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Parse a plain (`my_table`) or quoted (`"My Table"`) identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ClientError::invalid_input("Identifier cannot be empty"));
        }

        let name = match raw.strip_prefix('"') {
            Some(inner) => unquote(raw, inner)?,
            None => fold_plain(raw)?,
        };

        if name.contains('\0') {
            return Err(ClientError::invalid_input("Identifier cannot contain NUL bytes"));
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(ClientError::invalid_input(format!(
                "Identifier '{name}' is longer than {MAX_IDENTIFIER_LEN} bytes"
            )));
        }

        Ok(Self(name))
    }

    /// The name as stored in the catalog
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A name reported by the server, taken verbatim (no case folding)
    pub fn from_catalog(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains('\0') {
            return Err(ClientError::invalid_input(format!(
                "Invalid column name reported by server: {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.replace('"', "\"\""))
    }
}

fn unquote(raw: &str, inner: &str) -> Result<String> {
    let body = inner.strip_suffix('"').ok_or_else(|| {
        ClientError::invalid_input(format!("Unterminated quoted identifier: {raw}"))
    })?;

    let mut name = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if chars.peek() != Some(&'"') {
                return Err(ClientError::invalid_input(format!(
                    "Unescaped quote inside identifier: {raw}"
                )));
            }
            chars.next();
        }
        name.push(ch);
    }

    if name.is_empty() {
        return Err(ClientError::invalid_input("Quoted identifier cannot be empty"));
    }
    Ok(name)
}

fn fold_plain(raw: &str) -> Result<String> {
    let mut chars = raw.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if !(starts_ok && rest_ok) {
        return Err(ClientError::invalid_input(format!(
            "Invalid identifier '{raw}' (use letters, digits, '_' or '$', or double-quote it)"
        )));
    }
    Ok(raw.to_ascii_lowercase())
}

/// A table name, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    schema: Option<Identifier>,
    name: Identifier,
}

impl QualifiedName {
    /// Parse `table` or `schema.table`
    ///
    /// Dots inside double quotes do not separate parts.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = split_outside_quotes(raw, '.');
        match parts.as_slice() {
            [name] => Ok(Self { schema: None, name: Identifier::parse(name)? }),
            [schema, name] => Ok(Self {
                schema: Some(Identifier::parse(schema)?),
                name: Identifier::parse(name)?,
            }),
            _ => Err(ClientError::invalid_input(format!(
                "Invalid table name '{}' (expected 'table' or 'schema.table')",
                raw.trim()
            ))),
        }
    }

    /// Explicit schema, if one was given
    #[must_use]
    pub const fn schema(&self) -> Option<&Identifier> {
        self.schema.as_ref()
    }

    /// Unqualified table name
    #[must_use]
    pub const fn name(&self) -> &Identifier {
        &self.name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

fn split_outside_quotes(raw: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (idx, ch) in raw.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == separator && !in_quotes {
            parts.push(&raw[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// One entry of a `CREATE TABLE` column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDef {
    /// `<name> <type and column constraints>`
    Column { name: Identifier, definition: String },
    /// Table constraint such as `PRIMARY KEY (a, b)`
    Constraint(String),
}

impl ColumnDef {
    /// Parse a definition such as `id SERIAL PRIMARY KEY` or `UNIQUE (email)`
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ClientError::invalid_input("Column definition cannot be empty"));
        }

        if is_table_constraint(raw) {
            validate_clause(raw)?;
            return Ok(Self::Constraint(raw.to_string()));
        }

        let (name, rest) = split_leading_identifier(raw);
        let name = Identifier::parse(name)?;
        let definition = rest.trim();
        if definition.is_empty() {
            return Err(ClientError::invalid_input(format!(
                "Column definition for '{}' is missing a type",
                name.as_str()
            )));
        }
        validate_clause(definition)?;

        Ok(Self::Column { name, definition: definition.to_string() })
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { name, definition } => write!(f, "{name} {definition}"),
            Self::Constraint(clause) => f.write_str(clause),
        }
    }
}

fn is_table_constraint(raw: &str) -> bool {
    let word_len = raw
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(raw.len());
    let word = &raw[..word_len];
    TABLE_CONSTRAINT_KEYWORDS.iter().any(|keyword| word.eq_ignore_ascii_case(keyword))
}

fn split_leading_identifier(raw: &str) -> (&str, &str) {
    if raw.starts_with('"') {
        let bytes = raw.as_bytes();
        let mut idx = 1;
        while idx < bytes.len() {
            if bytes[idx] == b'"' {
                if bytes.get(idx + 1) == Some(&b'"') {
                    idx += 2;
                    continue;
                }
                return raw.split_at(idx + 1);
            }
            idx += 1;
        }
        return (raw, "");
    }

    match raw.find(char::is_whitespace) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    }
}

/// Reject clauses that could end the statement or hide text from it
///
/// String literals (including `E'...'` escape strings and `$tag$...$tag$` dollar
/// quotes) and quoted identifiers are skipped; parentheses must balance.
fn validate_clause(clause: &str) -> Result<()> {
    let chars: Vec<char> = clause.chars().collect();
    let unterminated = || {
        ClientError::invalid_input(format!("Unterminated quote in column definition: {clause}"))
    };
    let mut depth = 0usize;
    let mut idx = 0;

    while idx < chars.len() {
        let prev = idx.checked_sub(1).map(|i| chars[i]);
        match chars[idx] {
            '\'' => {
                idx = skip_quoted(&chars, idx, '\'', is_escape_string(&chars, idx))
                    .ok_or_else(unterminated)?;
                continue;
            }
            '"' => {
                idx = skip_quoted(&chars, idx, '"', false).ok_or_else(unterminated)?;
                continue;
            }
            // `$` inside a word (`a$b`) is part of an identifier, not a quote
            '$' if !prev.is_some_and(is_word_char) => {
                if let Some(tag_end) = dollar_tag_end(&chars, idx) {
                    idx = find_tag(&chars, tag_end + 1, &chars[idx..=tag_end])
                        .ok_or_else(unterminated)?;
                    continue;
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ClientError::invalid_input(format!(
                        "Unbalanced parentheses in column definition: {clause}"
                    ))
                })?;
            }
            ';' => {
                return Err(ClientError::invalid_input(format!(
                    "Column definitions cannot contain ';': {clause}"
                )))
            }
            '-' if chars.get(idx + 1) == Some(&'-') => {
                return Err(ClientError::invalid_input(format!(
                    "Column definitions cannot contain comments: {clause}"
                )))
            }
            '/' if chars.get(idx + 1) == Some(&'*') => {
                return Err(ClientError::invalid_input(format!(
                    "Column definitions cannot contain comments: {clause}"
                )))
            }
            '\0' => {
                return Err(ClientError::invalid_input(
                    "Column definitions cannot contain NUL bytes",
                ))
            }
            _ => {}
        }
        idx += 1;
    }

    if depth != 0 {
        return Err(ClientError::invalid_input(format!(
            "Unbalanced parentheses in column definition: {clause}"
        )));
    }
    Ok(())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// `E'...'` (a lone `E` before the quote) enables backslash escapes
fn is_escape_string(chars: &[char], quote: usize) -> bool {
    let Some(marker) = quote.checked_sub(1) else {
        return false;
    };
    matches!(chars[marker], 'e' | 'E')
        && !marker.checked_sub(1).is_some_and(|i| is_word_char(chars[i]))
}

/// Index just past the quote closing the one at `open`; doubled quotes do not close
fn skip_quoted(chars: &[char], open: usize, quote: char, backslash_escapes: bool) -> Option<usize> {
    let mut idx = open + 1;
    while idx < chars.len() {
        let c = chars[idx];
        if backslash_escapes && c == '\\' {
            idx += 2;
            continue;
        }
        if c == quote {
            if chars.get(idx + 1) == Some(&quote) {
                idx += 2;
                continue;
            }
            return Some(idx + 1);
        }
        idx += 1;
    }
    None
}

/// Index of the `$` closing a dollar-quote tag opened at `open` (`$$` or `$name$`)
fn dollar_tag_end(chars: &[char], open: usize) -> Option<usize> {
    let mut idx = open + 1;
    if chars.get(idx).is_some_and(char::is_ascii_digit) {
        return None;
    }
    while let Some(&c) = chars.get(idx) {
        if c == '$' {
            return Some(idx);
        }
        if !(c.is_alphanumeric() || c == '_') {
            return None;
        }
        idx += 1;
    }
    None
}

/// Index just past the first occurrence of `tag` at or after `from`
fn find_tag(chars: &[char], from: usize, tag: &[char]) -> Option<usize> {
    let last = chars.len().checked_sub(tag.len())?;
    (from..=last).find(|&i| chars[i..i + tag.len()] == *tag).map(|i| i + tag.len())
}

/// SQL text plus its textual arguments, bound in order to `$1..$n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub sql: String,
    pub args: Vec<String>,
}

impl Command {
    fn new(sql: String) -> Self {
        Self { sql, args: Vec::new() }
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// `CREATE TABLE IF NOT EXISTS`
#[must_use]
pub fn create_table(table: &QualifiedName, columns: &[ColumnDef]) -> Command {
    let columns = columns.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    Command::new(format!("CREATE TABLE IF NOT EXISTS {table} ({columns})"))
}

/// Single-value insert into the `data` column
#[must_use]
pub fn insert_data(table: &QualifiedName, value: &str) -> Command {
    Command::new(format!("INSERT INTO {table} (\"{DATA_COLUMN}\") VALUES ($1)")).arg(value)
}

/// Every value of one column
#[must_use]
pub fn select_column(table: &QualifiedName, column: &Identifier) -> Command {
    Command::new(format!("SELECT {column} FROM {table}"))
}

/// Listed columns, or `*` when none are listed
#[must_use]
pub fn select(table: &QualifiedName, columns: &[Identifier]) -> Command {
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    Command::new(format!("SELECT {projection} FROM {table}"))
}

/// Listed columns, casting the flagged ones to `text` under their own names
#[must_use]
pub fn select_as_text(table: &QualifiedName, columns: &[(Identifier, bool)]) -> Command {
    let projection = columns
        .iter()
        .map(|(column, as_text)| {
            if *as_text {
                format!("{column}::text AS {column}")
            } else {
                column.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    Command::new(format!("SELECT {projection} FROM {table}"))
}

/// Single-column equality update
#[must_use]
pub fn update_data(
    table: &QualifiedName,
    update_column: &Identifier,
    update_value: &str,
    condition_column: &Identifier,
    condition_value: &str,
) -> Command {
    Command::new(format!("UPDATE {table} SET {update_column} = $1 WHERE {condition_column} = $2"))
        .arg(update_value)
        .arg(condition_value)
}

/// Single-column equality delete
#[must_use]
pub fn delete_data(
    table: &QualifiedName,
    condition_column: &Identifier,
    condition_value: &str,
) -> Command {
    Command::new(format!("DELETE FROM {table} WHERE {condition_column} = $1")).arg(condition_value)
}

/// Scalar row count
#[must_use]
pub fn count_rows(table: &QualifiedName) -> Command {
    Command::new(format!("SELECT COUNT(*) FROM {table}"))
}

#[must_use]
pub fn drop_table(table: &QualifiedName) -> Command {
    Command::new(format!("DROP TABLE IF EXISTS {table}"))
}

/// Truncate, resetting owned sequences and cascading to referencing tables
#[must_use]
pub fn truncate_table(table: &QualifiedName) -> Command {
    Command::new(format!("TRUNCATE TABLE {table} RESTART IDENTITY CASCADE"))
}

/// Caller-supplied statement, passed through untouched
pub fn raw_query(sql: &str) -> Result<Command> {
    if sql.trim().is_empty() {
        return Err(ClientError::invalid_input("Query cannot be empty"));
    }
    Ok(Command::new(sql.to_string()))
}
