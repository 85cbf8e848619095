//! pgcrud CLI Entry Point
//!
//! Without a subcommand the demo scenario runs against `my_table`.
//! Subcommands:
//! - `demo` - Run the demo scenario
//! - `connect` - Check connection parameters and optionally save them as a profile
//! - `profiles` - List saved connection profiles
//! - one subcommand per table operation (`create-table`, `insert`, `select`, ...)
//!
//! Status lines go to stdout. Logs go to stderr.

use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pgcrud::report::{self, Operation};
use pgcrud::script::DEMO_TABLE;
use pgcrud::{
    list_profiles, load_with_precedence, resolve_params, run_demo, save_profile, ClientError,
    ConfigLocation, ConnectionParams, ErrorPolicy, ParamOverrides, PgClient, Reporter,
    StoredProfile,
};

/// pgcrud - Minimal PostgreSQL CRUD client
#[derive(Parser)]
#[command(name = "pgcrud")]
#[command(about = "Run basic table operations against PostgreSQL")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    conn: ConnectionArgs,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Server host
    #[arg(short = 'H', long, env = "PGHOST", global = true)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, env = "PGPORT", global = true)]
    port: Option<u16>,

    /// Database name
    #[arg(short = 'd', long, env = "PGDATABASE", global = true)]
    dbname: Option<String>,

    /// User name
    #[arg(short = 'U', long, env = "PGUSER", global = true)]
    user: Option<String>,

    /// Password (prefer PGPASSWORD or a profile with password_env)
    #[arg(short = 'W', long, env = "PGPASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Saved connection profile (defaults to the default profile, if any)
    #[arg(short = 'P', long, global = true)]
    profile: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    connect_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo scenario (default)
    Demo {
        /// Table the scenario works on
        #[arg(long, default_value = DEMO_TABLE)]
        table: String,

        /// Stop at the first failed step
        #[arg(long)]
        halt_on_error: bool,
    },

    /// Connect, print server details and disconnect
    Connect {
        /// Save the connection parameters (without password) under this profile name
        #[arg(long, value_name = "NAME")]
        save: Option<String>,

        /// Save to the per-user config instead of `.pgcrud/config.json`
        #[arg(long, requires = "save")]
        global: bool,
    },

    /// List saved connection profiles
    Profiles,

    #[command(flatten)]
    Op(OpCommand),
}

#[derive(Subcommand)]
enum OpCommand {
    /// Create a table if it does not exist
    CreateTable {
        table: String,

        /// Column definitions, e.g. "id SERIAL PRIMARY KEY" "data TEXT"
        #[arg(required = true)]
        columns: Vec<String>,
    },

    /// Insert a value into the table's `data` column
    Insert {
        table: String,

        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Print every value of a text column
    Extract { table: String, column: String },

    /// Print rows of a table
    Select {
        table: String,

        /// Comma-separated columns (all columns when omitted)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Set a column on rows matching `where_column = where_value`
    Update {
        table: String,
        column: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        where_column: String,
        #[arg(allow_hyphen_values = true)]
        where_value: String,
    },

    /// Delete rows matching `where_column = where_value`
    Delete {
        table: String,
        where_column: String,
        #[arg(allow_hyphen_values = true)]
        where_value: String,
    },

    /// List tables in the current schema
    Tables,

    /// List a table's columns and types
    Describe { table: String },

    /// Count a table's rows
    Count { table: String },

    /// Execute a single SQL statement
    Exec { query: String },

    /// Drop a table if it exists
    Drop { table: String },

    /// Remove all rows and reset identity columns
    Truncate { table: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "pgcrud=debug" } else { "pgcrud=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Demo {
        table: DEMO_TABLE.to_string(),
        halt_on_error: false,
    });

    match command {
        Commands::Profiles => print_profiles(),
        Commands::Demo { table, halt_on_error } => {
            let mut client = PgClient::new(connection_params(&cli.conn)?);
            let policy = if halt_on_error { ErrorPolicy::Halt } else { ErrorPolicy::Continue };

            let summary = run_demo(&mut client, &table, policy, io::stdout()).await?;

            // Under the continue policy failures are reported but do not fail the run
            Ok(if summary.halted { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::Connect { save, global } => {
            let mut client = PgClient::new(connection_params(&cli.conn)?);
            let location = if global { ConfigLocation::Global } else { ConfigLocation::Local };
            connect(&mut client, save.as_deref(), location).await
        }
        Commands::Op(op) => {
            let mut client = PgClient::new(connection_params(&cli.conn)?);
            run_single(&mut client, &op).await
        }
    }
}

fn connection_params(args: &ConnectionArgs) -> Result<ConnectionParams> {
    let registry = load_with_precedence()?;
    let profile = registry.select(args.profile.as_deref())?;

    let overrides = ParamOverrides {
        host: args.host.clone(),
        port: args.port,
        user: args.user.clone(),
        database: args.dbname.clone(),
        password: args.password.clone(),
        connect_timeout: args.connect_timeout.map(Duration::from_secs),
    };

    Ok(resolve_params(&overrides, profile, prompt_password)?)
}

/// Ask for a password on a terminal; non-interactive runs get an empty password
fn prompt_password() -> pgcrud::Result<String> {
    if !io::stdin().is_terminal() {
        return Ok(String::new());
    }

    dialoguer::Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| ClientError::config_error(format!("Could not read password: {e}")))
}

fn print_profiles() -> Result<ExitCode> {
    let profiles = list_profiles()?;
    let mut out = io::stdout().lock();

    if profiles.is_empty() {
        writeln!(out, "No saved connection profiles.")?;
    }
    for (name, profile, is_default) in &profiles {
        writeln!(out, "{}", report::profile_line(name, profile, *is_default))?;
    }

    Ok(ExitCode::SUCCESS)
}

async fn connect(
    client: &mut PgClient,
    save: Option<&str>,
    location: ConfigLocation,
) -> Result<ExitCode> {
    let mut reporter = Reporter::new(io::stdout());

    let info = reporter.step(Operation::Connect, client.connect().await, |info| {
        let mut lines = report::connected(info);
        lines.extend(report::connection_details(info));
        lines
    })?;
    let closed = client.close().await;
    reporter.step(Operation::Close, closed, |_| report::connection_closed())?;

    if info.is_none() {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(name) = save {
        let path = save_profile(name, StoredProfile::from_params(client.params()), location)?;
        println!("Saved profile '{name}' to {}", path.display());
    }

    Ok(if reporter.summary().failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Connect, run one operation, close; only the operation's outcome is printed on success
async fn run_single(client: &mut PgClient, op: &OpCommand) -> Result<ExitCode> {
    let mut reporter = Reporter::new(io::stdout());

    let connected = reporter.step(Operation::Connect, client.connect().await, |_| Vec::new())?;
    if connected.is_some() {
        dispatch(client, op, &mut reporter).await?;
    }

    let closed = client.close().await;
    reporter.step(Operation::Close, closed, |_| Vec::new())?;

    Ok(if reporter.summary().failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

async fn dispatch<W: Write>(
    client: &PgClient,
    op: &OpCommand,
    reporter: &mut Reporter<W>,
) -> pgcrud::Result<()> {
    match op {
        OpCommand::CreateTable { table, columns } => {
            reporter.step(
                Operation::CreateTable,
                client.create_table(table, columns).await,
                |_| report::table_created(table),
            )?;
        }
        OpCommand::Insert { table, value } => {
            reporter.step(
                Operation::InsertData,
                client.insert_data(table, value).await,
                |_| report::data_inserted(),
            )?;
        }
        OpCommand::Extract { table, column } => {
            reporter.step(
                Operation::ExtractColumnValues,
                client.extract_column_values(table, column).await,
                |values| report::column_values(column, values),
            )?;
        }
        OpCommand::Select { table, columns } => {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            reporter.step(
                Operation::SelectData,
                client.select_data(table, Some(columns.as_slice())).await,
                report::rows,
            )?;
        }
        OpCommand::Update { table, column, value, where_column, where_value } => {
            reporter.step(
                Operation::UpdateData,
                client.update_data(table, column, value, where_column, where_value).await,
                |_| report::data_updated(),
            )?;
        }
        OpCommand::Delete { table, where_column, where_value } => {
            reporter.step(
                Operation::DeleteData,
                client.delete_data(table, where_column, where_value).await,
                |_| report::data_deleted(),
            )?;
        }
        OpCommand::Tables => {
            reporter.step(Operation::ListTables, client.list_tables().await, |tables| {
                report::table_list(tables)
            })?;
        }
        OpCommand::Describe { table } => {
            reporter.step(
                Operation::DescribeTable,
                client.describe_table(table).await,
                |columns| report::table_columns(table, columns),
            )?;
        }
        OpCommand::Count { table } => {
            reporter.step(
                Operation::CountRows,
                client.count_rows(table).await,
                |count| report::row_count(table, *count),
            )?;
        }
        OpCommand::Exec { query } => {
            reporter.step(
                Operation::ExecuteQuery,
                client.execute_query(query).await,
                |_| report::query_executed(),
            )?;
        }
        OpCommand::Drop { table } => {
            reporter.step(
                Operation::DropTable,
                client.drop_table(table).await,
                |_| report::table_dropped(table),
            )?;
        }
        OpCommand::Truncate { table } => {
            reporter.step(
                Operation::TruncateTable,
                client.truncate_table(table).await,
                |_| report::table_truncated(table),
            )?;
        }
    }

    Ok(())
}
