//! Demo Scenario
//!
//! Runs the fixed create/insert/inspect/update/delete sequence against one table,
//! printing a status line for every step.
//!
//! # Error Policy
//! - [`ErrorPolicy::Continue`] attempts every step even after failures
//! - [`ErrorPolicy::Halt`] stops at the first failed step
//!
//! The connection is closed after the last attempted step under either policy.

use std::io::Write;

use tracing::{debug, info};

use crate::client::PgClient;
use crate::error::Result;
use crate::report::{self, Operation};
use crate::sql::QualifiedName;

/// Table used when none is given
pub const DEMO_TABLE: &str = "my_table";

/// Column definitions of the demo table
pub const DEMO_COLUMNS: [&str; 2] = ["id SERIAL PRIMARY KEY", "data TEXT"];

/// What to do after a failed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Report the failure and keep going
    #[default]
    Continue,
    /// Report the failure and skip the remaining steps
    Halt,
}

/// Outcome counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoSummary {
    /// Steps attempted, including `close`
    pub attempted: usize,
    /// Steps that reported a failure
    pub failed: usize,
    /// Whether [`ErrorPolicy::Halt`] cut the run short
    pub halted: bool,
}

/// Writes one status block per operation outcome and counts failures
pub struct Reporter<W> {
    out: W,
    summary: DemoSummary,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, summary: DemoSummary::default() }
    }

    /// Report `result`, returning the success value
    ///
    /// A failed operation is written as its failure line and yields `Ok(None)`.
    /// Only failures to write the output itself are returned as errors.
    pub fn step<T, F>(&mut self, op: Operation, result: Result<T>, render: F) -> Result<Option<T>>
    where
        F: FnOnce(&T) -> Vec<String>,
    {
        self.summary.attempted += 1;

        match result {
            Ok(value) => {
                debug!(operation = %op, "step succeeded");
                for line in render(&value) {
                    writeln!(self.out, "{line}")?;
                }
                Ok(Some(value))
            }
            Err(err) => {
                debug!(operation = %op, code = err.error_code(), "step failed");
                self.summary.failed += 1;
                writeln!(self.out, "{}", report::failure(op, &err))?;
                Ok(None)
            }
        }
    }

    #[must_use]
    pub const fn summary(&self) -> DemoSummary {
        self.summary
    }

    pub fn into_parts(self) -> (W, DemoSummary) {
        (self.out, self.summary)
    }
}

/// Run the demo scenario on `table`, then close the connection
pub async fn run_demo<W: Write>(
    client: &mut PgClient,
    table: &str,
    policy: ErrorPolicy,
    out: W,
) -> Result<DemoSummary> {
    info!(table, ?policy, "running demo");

    let mut reporter = Reporter::new(out);
    let steps = run_steps(client, table, policy, &mut reporter).await;

    // Close even when writing a step's status failed
    let closed = client.close().await;
    let reported = reporter.step(Operation::Close, closed, |_| report::connection_closed());
    let halted = steps?;
    reported?;

    let (_, mut summary) = reporter.into_parts();
    summary.halted = halted;

    info!(attempted = summary.attempted, failed = summary.failed, halted, "demo finished");
    Ok(summary)
}

const fn should_halt<T>(policy: ErrorPolicy, outcome: &Option<T>) -> bool {
    matches!(policy, ErrorPolicy::Halt) && outcome.is_none()
}

/// Returns whether the run halted early
async fn run_steps<W: Write>(
    client: &mut PgClient,
    table: &str,
    policy: ErrorPolicy,
    reporter: &mut Reporter<W>,
) -> Result<bool> {
    let outcome = reporter.step(Operation::Connect, client.connect().await, report::connected)?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::CreateTable,
        client.create_table(table, &DEMO_COLUMNS).await,
        |_| report::table_created(table),
    )?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::InsertData,
        client.insert_data(table, "Some data").await,
        |_| report::data_inserted(),
    )?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome =
        reporter.step(Operation::ListTables, client.list_tables().await, |t| report::table_list(t))?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::DescribeTable,
        client.describe_table(table).await,
        |columns| report::table_columns(table, columns),
    )?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::CountRows,
        client.count_rows(table).await,
        |count| report::row_count(table, *count),
    )?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let executed = match select_all_query(table) {
        Ok(query) => client.execute_query(&query).await,
        Err(err) => Err(err),
    };
    let outcome = reporter.step(Operation::ExecuteQuery, executed, |_| report::query_executed())?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome =
        reporter.step(Operation::SelectData, client.select_data(table, None).await, report::rows)?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::UpdateData,
        client.update_data(table, "data", "New data", "id", "1").await,
        |_| report::data_updated(),
    )?;
    if should_halt(policy, &outcome) {
        return Ok(true);
    }

    let outcome = reporter.step(
        Operation::DeleteData,
        client.delete_data(table, "id", "1").await,
        |_| report::data_deleted(),
    )?;
    Ok(should_halt(policy, &outcome))
}

fn select_all_query(table: &str) -> Result<String> {
    let table = QualifiedName::parse(table)?;
    Ok(format!("SELECT * FROM {table}"))
}
