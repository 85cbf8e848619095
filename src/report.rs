//! Status Lines
//!
//! Renders the human-readable line(s) printed after each operation.
//! Success renderers return the lines to print; [`failure`] renders the single
//! `<prefix>: <message>` line for any operation.

use std::fmt;

use crate::client::{display_value, ColumnInfo, ConnectionInfo, QueryResult};
use crate::config::StoredProfile;
use crate::error::ClientError;

/// Operation a status line reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    CreateTable,
    InsertData,
    ExtractColumnValues,
    SelectData,
    UpdateData,
    DeleteData,
    ListTables,
    DescribeTable,
    CountRows,
    ExecuteQuery,
    DropTable,
    TruncateTable,
    Close,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::CreateTable => "create_table",
            Self::InsertData => "insert_data",
            Self::ExtractColumnValues => "extract_column_values",
            Self::SelectData => "select_data",
            Self::UpdateData => "update_data",
            Self::DeleteData => "delete_data",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::CountRows => "count_rows",
            Self::ExecuteQuery => "execute_query",
            Self::DropTable => "drop_table",
            Self::TruncateTable => "truncate_table",
            Self::Close => "close",
        }
    }

    /// Leading text of the failure line
    #[must_use]
    pub const fn failure_prefix(self) -> &'static str {
        match self {
            Self::Connect => "Error connecting to PostgreSQL",
            Self::CreateTable => "Error creating table",
            Self::InsertData => "Error inserting data",
            Self::ExtractColumnValues => "Error extracting column values",
            Self::SelectData => "Error selecting data",
            Self::UpdateData => "Error updating data",
            Self::DeleteData => "Error deleting data",
            Self::ListTables => "Error listing tables",
            Self::DescribeTable => "Error describing table",
            Self::CountRows => "Error counting rows",
            Self::ExecuteQuery => "Error executing query",
            Self::DropTable => "Error dropping table",
            Self::TruncateTable => "Error truncating table",
            Self::Close => "Error closing connection",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn failure(op: Operation, err: &ClientError) -> String {
    format!("{}: {}", op.failure_prefix(), err.message())
}

#[must_use]
pub fn connected(_info: &ConnectionInfo) -> Vec<String> {
    vec!["Connected to PostgreSQL!".to_string()]
}

/// Extra detail shown by the `connect` subcommand
#[must_use]
pub fn connection_details(info: &ConnectionInfo) -> Vec<String> {
    vec![
        format!("Server version: {}", info.database_version),
        format!("Database: {}", info.connected_database),
        format!("User: {}", info.user),
    ]
}

#[must_use]
pub fn table_created(table: &str) -> Vec<String> {
    vec![format!("Table '{table}' created or already exists.")]
}

#[must_use]
pub fn data_inserted() -> Vec<String> {
    vec!["Data inserted successfully.".to_string()]
}

#[must_use]
pub fn column_values(column: &str, values: &[Option<String>]) -> Vec<String> {
    let joined = values
        .iter()
        .map(|v| v.as_deref().unwrap_or("NULL"))
        .collect::<Vec<_>>()
        .join(", ");
    vec![format!("All values in column '{column}': {joined}")]
}

/// One `col: value, col: value` line per row
#[must_use]
pub fn rows(result: &QueryResult) -> Vec<String> {
    result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .zip(row)
                .map(|(col, value)| format!("{col}: {}", display_value(value)))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

#[must_use]
pub fn data_updated() -> Vec<String> {
    vec!["Data updated successfully.".to_string()]
}

#[must_use]
pub fn data_deleted() -> Vec<String> {
    vec!["Data deleted successfully.".to_string()]
}

#[must_use]
pub fn table_list(tables: &[String]) -> Vec<String> {
    std::iter::once("List of tables:".to_string()).chain(tables.iter().cloned()).collect()
}

#[must_use]
pub fn table_columns(table: &str, columns: &[ColumnInfo]) -> Vec<String> {
    std::iter::once(format!("Columns in table '{table}':"))
        .chain(columns.iter().map(|c| format!("{} - {}", c.name, c.data_type)))
        .collect()
}

#[must_use]
pub fn row_count(table: &str, count: i64) -> Vec<String> {
    vec![format!("Total number of rows in table '{table}': {count}")]
}

#[must_use]
pub fn query_executed() -> Vec<String> {
    vec!["Query executed successfully.".to_string()]
}

#[must_use]
pub fn table_dropped(table: &str) -> Vec<String> {
    vec![format!("Table '{table}' dropped successfully.")]
}

#[must_use]
pub fn table_truncated(table: &str) -> Vec<String> {
    vec![format!("Table '{table}' truncated successfully.")]
}

#[must_use]
pub fn connection_closed() -> Vec<String> {
    vec!["Connection closed.".to_string()]
}

/// `name  user@host:port/database` with a marker on the default profile
#[must_use]
pub fn profile_line(name: &str, profile: &StoredProfile, is_default: bool) -> String {
    let marker = if is_default { "* " } else { "  " };
    let user = profile.user.as_deref().unwrap_or("-");
    let host = profile.host.as_deref().unwrap_or("-");
    let port = profile.port.map_or_else(|| "-".to_string(), |p| p.to_string());
    let database = profile.database.as_deref().unwrap_or("-");
    format!("{marker}{name}  {user}@{host}:{port}/{database}")
}
