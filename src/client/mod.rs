//! `PostgreSQL` Client Wrapper
//!
//! [`PgClient`] owns one connection and exposes one method per supported operation.
//!
//! # Lifecycle
//! - [`PgClient::connect`] opens the connection and spawns the task that drives it
//! - Every other operation requires an open connection and fails with
//!   [`ClientError::NotConnected`] otherwise
//! - [`PgClient::close`] releases the connection; calling it again is a no-op
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Each operation builds its own [`Command`]; nothing is reused between calls
//! - Text arguments are coerced to the parameter types the server inferred
//! - Catalog lookups bind schema and table names as parameters
//! - Failures are returned, never printed; see [`crate::report`] for rendering

mod params;
mod value;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, ToSql};
use tokio_postgres::{Client, Column, Config, NoTls, Row, Statement};
use tracing::{debug, info, warn};

use crate::config::ConnectionParams;
use crate::error::{describe_pg_error, ClientError, Result};
use crate::sql::{self, ColumnDef, Command, Identifier, QualifiedName};

pub use value::display_value;

/// Connection information returned after connecting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Database server version string (e.g. "16.2")
    pub database_version: String,

    /// Full `version()` output
    pub server_info: String,

    /// Name of the connected database
    pub connected_database: String,

    /// Connected user name
    pub user: String,
}

/// Column information from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// Column data type as reported by `information_schema`
    pub data_type: String,

    /// Whether column allows NULL values
    pub nullable: bool,

    /// Default expression (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Materialized result of a `SELECT`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result set
    pub columns: Vec<String>,

    /// Result rows, one value per column
    pub rows: Vec<Vec<serde_json::Value>>,
}

struct Session {
    client: Client,
    driver: JoinHandle<()>,
}

/// Single-connection `PostgreSQL` client
pub struct PgClient {
    params: ConnectionParams,
    session: Option<Session>,
}

impl PgClient {
    /// Create an unconnected client
    #[must_use]
    pub const fn new(params: ConnectionParams) -> Self {
        Self { params, session: None }
    }

    #[must_use]
    pub const fn params(&self) -> &ConnectionParams {
        &self.params
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open the connection
    ///
    /// On failure the client stays unconnected. Connecting while connected replaces
    /// the previous connection.
    pub async fn connect(&mut self) -> Result<ConnectionInfo> {
        if self.session.is_some() {
            debug!("replacing open connection");
            if let Err(e) = self.close().await {
                warn!("previous connection did not close cleanly: {e}");
            }
        }

        let pg_config = build_pg_config(&self.params);
        debug!(
            host = self.params.host(),
            port = self.params.port(),
            database = self.params.database(),
            user = self.params.user(),
            "connecting"
        );

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            ClientError::connection_failed(format!(
                "Failed to connect to PostgreSQL at {}:{}: {}",
                self.params.host(),
                self.params.port(),
                describe_pg_error(&e)
            ))
        })?;

        // Drives the socket until the client is dropped
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("connection task ended with error: {e}");
            }
        });
        self.session = Some(Session { client, driver });

        let server = server_info(self.client()?).await;
        let info = match server {
            Ok(info) => info,
            Err(e) => {
                if let Err(close_err) = self.close().await {
                    warn!("connection did not close cleanly after failed handshake query: {close_err}");
                }
                return Err(e);
            }
        };

        info!(
            version = %info.database_version,
            database = %info.connected_database,
            user = %info.user,
            "connected to PostgreSQL"
        );
        Ok(info)
    }

    /// `CREATE TABLE IF NOT EXISTS` with the given column definitions
    pub async fn create_table<S: AsRef<str>>(&self, table: &str, column_defs: &[S]) -> Result<()> {
        let table = QualifiedName::parse(table)?;
        let columns = column_defs
            .iter()
            .map(|def| ColumnDef::parse(def.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        self.run(&sql::create_table(&table, &columns)).await?;
        Ok(())
    }

    /// Insert one value into the table's `data` column
    pub async fn insert_data(&self, table: &str, value: &str) -> Result<u64> {
        let table = QualifiedName::parse(table)?;
        self.run(&sql::insert_data(&table, value)).await
    }

    /// Every value of a string-typed column; NULLs are `None`
    pub async fn extract_column_values(
        &self,
        table: &str,
        column: &str,
    ) -> Result<Vec<Option<String>>> {
        let table = QualifiedName::parse(table)?;
        let column = Identifier::parse(column)?;

        let (stmt, rows) = self.fetch(&sql::select_column(&table, &column)).await?;

        let col_type = stmt
            .columns()
            .first()
            .map(|c| c.type_().clone())
            .ok_or_else(|| ClientError::query_failed("Query returned no columns"))?;
        if !<String as FromSql>::accepts(&col_type) {
            return Err(ClientError::query_failed(format!(
                "Column '{}' has type '{}', expected a string type",
                column.as_str(),
                col_type.name()
            )));
        }

        rows.iter()
            .map(|row| {
                row.try_get::<_, Option<String>>(0).map_err(|e| {
                    ClientError::query_failed(format!("Failed to read column value: {e}"))
                })
            })
            .collect()
    }

    /// Select listed columns, or all columns when `columns` is `None` or empty
    pub async fn select_data(&self, table: &str, columns: Option<&[&str]>) -> Result<QueryResult> {
        let table = QualifiedName::parse(table)?;
        let projection = columns
            .unwrap_or_default()
            .iter()
            .map(|c| Identifier::parse(c))
            .collect::<Result<Vec<_>>>()?;

        let (stmt, bound) = self.prepare(&sql::select(&table, &projection)).await?;

        // Columns the row decoder cannot read are selected as text instead
        let (stmt, rows) = match text_fallback(&table, stmt.columns())? {
            Some(command) => {
                debug!(sql = %command.sql, "selecting undecodable columns as text");
                self.fetch(&command).await?
            }
            None => {
                let rows = self.query_prepared(&stmt, &bound).await?;
                (stmt, rows)
            }
        };

        let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = rows.iter().map(value::row_to_json).collect::<Result<Vec<_>>>()?;

        Ok(QueryResult { columns, rows })
    }

    /// `UPDATE table SET update_column = update_value WHERE condition_column = condition_value`
    pub async fn update_data(
        &self,
        table: &str,
        update_column: &str,
        update_value: &str,
        condition_column: &str,
        condition_value: &str,
    ) -> Result<u64> {
        let table = QualifiedName::parse(table)?;
        let update_column = Identifier::parse(update_column)?;
        let condition_column = Identifier::parse(condition_column)?;

        self.run(&sql::update_data(
            &table,
            &update_column,
            update_value,
            &condition_column,
            condition_value,
        ))
        .await
    }

    /// `DELETE FROM table WHERE condition_column = condition_value`
    pub async fn delete_data(
        &self,
        table: &str,
        condition_column: &str,
        condition_value: &str,
    ) -> Result<u64> {
        let table = QualifiedName::parse(table)?;
        let condition_column = Identifier::parse(condition_column)?;

        self.run(&sql::delete_data(&table, &condition_column, condition_value)).await
    }

    /// Base tables of the session's current schema
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client()?;
        let schema = current_schema(client).await?;

        debug!(schema = %schema, "listing tables");
        let rows = client.query(sql::LIST_TABLES, &[&schema]).await.map_err(|e| {
            ClientError::query_failed(format!(
                "Failed to list tables in schema '{schema}': {}",
                describe_pg_error(&e)
            ))
        })?;

        rows.iter().map(|row| get_text(row, 0)).collect()
    }

    /// Column names and types of a table, in ordinal order
    pub async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = QualifiedName::parse(table)?;
        let client = self.client()?;

        let schema = match table.schema() {
            Some(schema) => schema.as_str().to_string(),
            None => current_schema(client).await?,
        };
        let name = table.name().as_str();

        debug!(schema = %schema, table = name, "describing table");
        let row = client.query_one(sql::TABLE_EXISTS, &[&schema, &name]).await.map_err(|e| {
            ClientError::query_failed(format!(
                "Failed to check table existence: {}",
                describe_pg_error(&e)
            ))
        })?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| ClientError::query_failed(format!("Failed to read table count: {e}")))?;
        if count == 0 {
            return Err(ClientError::invalid_input(format!(
                "Table '{name}' not found in schema '{schema}'"
            )));
        }

        let rows = client.query(sql::DESCRIBE_COLUMNS, &[&schema, &name]).await.map_err(|e| {
            ClientError::query_failed(format!(
                "Failed to query columns for {schema}.{name}: {}",
                describe_pg_error(&e)
            ))
        })?;

        rows.iter()
            .map(|row| {
                let default: Option<String> = row.try_get(3).map_err(|e| {
                    ClientError::query_failed(format!("Failed to read column default: {e}"))
                })?;
                Ok(ColumnInfo {
                    name: get_text(row, 0)?,
                    data_type: get_text(row, 1)?,
                    nullable: get_text(row, 2)? == "YES",
                    default,
                })
            })
            .collect()
    }

    /// Scalar `COUNT(*)`
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let table = QualifiedName::parse(table)?;
        let (_, rows) = self.fetch(&sql::count_rows(&table)).await?;

        let row = rows
            .first()
            .ok_or_else(|| ClientError::query_failed("COUNT(*) returned no rows"))?;
        row.try_get(0)
            .map_err(|e| ClientError::query_failed(format!("Failed to read row count: {e}")))
    }

    /// Execute any single statement, discarding rows it returns
    ///
    /// Returns the number of rows the statement affected (or returned).
    pub async fn execute_query(&self, query: &str) -> Result<u64> {
        self.run(&sql::raw_query(query)?).await
    }

    /// `DROP TABLE IF EXISTS`
    pub async fn drop_table(&self, table: &str) -> Result<()> {
        let table = QualifiedName::parse(table)?;
        self.run(&sql::drop_table(&table)).await?;
        Ok(())
    }

    /// `TRUNCATE ... RESTART IDENTITY CASCADE`
    pub async fn truncate_table(&self, table: &str) -> Result<()> {
        let table = QualifiedName::parse(table)?;
        self.run(&sql::truncate_table(&table)).await?;
        Ok(())
    }

    /// Release the connection
    ///
    /// Dropping the driver client ends the connection task, which is then awaited.
    /// Without an open connection this does nothing.
    pub async fn close(&mut self) -> Result<()> {
        let Some(Session { client, driver }) = self.session.take() else {
            debug!("close called without an open connection");
            return Ok(());
        };

        drop(client);
        driver.await.map_err(|e| {
            ClientError::connection_failed(format!("Connection task ended abnormally: {e}"))
        })?;

        info!("connection closed");
        Ok(())
    }

    fn client(&self) -> Result<&Client> {
        self.session.as_ref().map(|s| &s.client).ok_or(ClientError::NotConnected)
    }

    /// Prepare `command` and coerce its arguments to the inferred parameter types
    async fn prepare(&self, command: &Command) -> Result<(Statement, Vec<params::BoxedParam>)> {
        let client = self.client()?;

        debug!(sql = %command.sql, args = command.args.len(), "preparing statement");
        let stmt = client.prepare(&command.sql).await.map_err(|e| {
            ClientError::query_failed(format!(
                "Failed to prepare statement: {}",
                describe_pg_error(&e)
            ))
        })?;

        if stmt.params().len() != command.args.len() {
            return Err(ClientError::query_failed(format!(
                "Statement expects {} parameter(s), {} given",
                stmt.params().len(),
                command.args.len()
            )));
        }

        let bound = stmt
            .params()
            .iter()
            .zip(&command.args)
            .map(|(ty, arg)| params::bind_text(arg, ty))
            .collect::<Result<Vec<_>>>()?;

        Ok((stmt, bound))
    }

    /// Execute a command, returning the affected row count
    async fn run(&self, command: &Command) -> Result<u64> {
        let (stmt, bound) = self.prepare(command).await?;
        let refs: Vec<&(dyn ToSql + Sync)> = params::as_refs(&bound);

        let affected = self.client()?.execute(&stmt, &refs).await.map_err(|e| {
            ClientError::query_failed(format!(
                "Failed to execute statement: {}",
                describe_pg_error(&e)
            ))
        })?;

        debug!(rows_affected = affected, "statement executed");
        Ok(affected)
    }

    /// Execute a command and collect every row
    async fn fetch(&self, command: &Command) -> Result<(Statement, Vec<Row>)> {
        let (stmt, bound) = self.prepare(command).await?;
        let rows = self.query_prepared(&stmt, &bound).await?;
        Ok((stmt, rows))
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        bound: &[params::BoxedParam],
    ) -> Result<Vec<Row>> {
        let refs: Vec<&(dyn ToSql + Sync)> = params::as_refs(bound);

        let rows = self.client()?.query(stmt, &refs).await.map_err(|e| {
            ClientError::query_failed(format!("Failed to execute query: {}", describe_pg_error(&e)))
        })?;

        debug!(rows = rows.len(), "query returned");
        Ok(rows)
    }
}

/// Projection casting undecodable columns to text, or `None` when every column decodes
fn text_fallback(table: &QualifiedName, columns: &[Column]) -> Result<Option<Command>> {
    if columns.iter().all(|c| value::decodes(c.type_())) {
        return Ok(None);
    }

    let projection = columns
        .iter()
        .map(|c| Ok((Identifier::from_catalog(c.name())?, !value::decodes(c.type_()))))
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(sql::select_as_text(table, &projection)))
}

/// Build driver configuration from connection parameters
fn build_pg_config(params: &ConnectionParams) -> Config {
    let mut pg_config = Config::new();
    pg_config
        .host(params.host())
        .port(params.port())
        .user(params.user())
        .password(params.password())
        .dbname(params.database())
        .application_name(env!("CARGO_PKG_NAME"));

    if let Some(timeout) = params.connect_timeout() {
        pg_config.connect_timeout(timeout);
    }

    pg_config
}

/// Server version, database and user of the open session
async fn server_info(client: &Client) -> Result<ConnectionInfo> {
    let row = client
        .query_one("SELECT version(), current_database(), current_user", &[])
        .await
        .map_err(|e| {
            ClientError::connection_failed(format!(
                "Failed to query server information: {}",
                describe_pg_error(&e)
            ))
        })?;

    let server_info = get_text(&row, 0)?;

    // "PostgreSQL 16.2 on x86_64..." -> "16.2"
    let database_version = server_info.split_whitespace().nth(1).unwrap_or("unknown").to_string();

    Ok(ConnectionInfo {
        database_version,
        server_info,
        connected_database: get_text(&row, 1)?,
        user: get_text(&row, 2)?,
    })
}

async fn current_schema(client: &Client) -> Result<String> {
    let row = client.query_one(sql::CURRENT_SCHEMA, &[]).await.map_err(|e| {
        ClientError::query_failed(format!(
            "Failed to query current schema: {}",
            describe_pg_error(&e)
        ))
    })?;

    let schema: Option<String> = row
        .try_get(0)
        .map_err(|e| ClientError::query_failed(format!("Failed to read current schema: {e}")))?;
    schema.ok_or_else(|| ClientError::query_failed("No current schema (empty search_path)"))
}

fn get_text(row: &Row, idx: usize) -> Result<String> {
    row.try_get(idx)
        .map_err(|e| ClientError::query_failed(format!("Failed to read catalog value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_postgres::config::Host;

    fn params() -> ConnectionParams {
        ConnectionParams::new("postgres", "postgres", "postgres")
    }

    #[test]
    fn test_build_pg_config() {
        let params = params()
            .with_host("db.example")
            .with_port(6543)
            .with_connect_timeout(Duration::from_secs(5));
        let config = build_pg_config(&params);

        assert_eq!(config.get_hosts(), &[Host::Tcp("db.example".to_string())]);
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_user(), Some("postgres"));
        assert_eq!(config.get_dbname(), Some("postgres"));
        assert_eq!(config.get_password(), Some(&b"postgres"[..]));
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn test_new_client_is_not_connected() {
        let client = PgClient::new(params());
        assert!(!client.is_connected());
        assert_eq!(client.params().port(), 5432);
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let client = PgClient::new(params());

        let err = client.count_rows("my_table").await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        let err = client.list_tables().await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_invalid_names_fail_before_touching_connection() {
        let client = PgClient::new(params());

        let err = client.drop_table("users; DROP TABLE accounts").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");

        let err = client.execute_query("   ").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let mut client = PgClient::new(params());
        assert!(client.close().await.is_ok());
        assert!(client.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_client_unconnected() {
        let params = params()
            .with_host("127.0.0.1")
            .with_port(1)
            .with_connect_timeout(Duration::from_secs(2));
        let mut client = PgClient::new(params);

        let err = client.connect().await.unwrap_err();
        assert_eq!(err.error_code(), "CONNECTION_FAILED");
        assert!(err.message().contains("127.0.0.1:1"));
        assert!(!client.is_connected());
    }
}
