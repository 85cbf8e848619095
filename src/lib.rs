//! pgcrud - Minimal `PostgreSQL` CRUD Client
//!
//! pgcrud wraps a single `PostgreSQL` connection behind a small set of table
//! operations (create, insert, select, update, delete, inspect, drop, truncate)
//! and ships a CLI that runs them one at a time or as a fixed demo scenario.
//!
//! # Core Principles
//! - Values are always bound as parameters, never spliced into SQL text
//! - Table and column names are validated and quoted
//! - Every operation returns a `Result`; the caller chooses to halt or continue
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`sql`] - Identifier validation and statement building
//! - [`client`] - Connection lifecycle and table operations
//! - [`report`] - Human-readable status lines
//! - [`script`] - Demo scenario and error policy
//! - [`config`] - Connection profiles and parameter resolution

pub mod client;
pub mod config;
pub mod error;
pub mod report;
pub mod script;
pub mod sql;

pub use client::{ColumnInfo, ConnectionInfo, PgClient, QueryResult};
pub use config::{
    list_profiles, load_with_precedence, resolve_params, save_profile, ConfigLocation,
    ConnectionParams, ParamOverrides, ProfileRegistry, StoredProfile,
};
pub use error::{ClientError, Result};
pub use script::{run_demo, DemoSummary, ErrorPolicy, Reporter};
