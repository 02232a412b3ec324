use clap::{ArgAction, Parser, Subcommand};

use crate::config::DbConfig;
use crate::query::{DEFAULT_CLAIM_TABLE, DEFAULT_SUBJECT_TABLE};

const DEFAULT_DATABASE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/claims.duckdb");

#[derive(Parser, Debug)]
#[command(name = "claims-metrics")]
#[command(about = "Aggregate reports over the CMS population and claims tables (DuckDB)", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve every metric as a read-only HTTP endpoint.
    Serve(ServeArgs),
    /// Run one metric and print its JSON result.
    Query(QueryArgs),
    /// List the metric catalog as JSON.
    Metrics,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DbArgs {
    /// DuckDB database file (or :memory:).
    #[arg(long, default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// Open the database file for writing. Files are opened read-only
    /// otherwise, so a missing file is an error instead of a new empty one.
    #[arg(long = "read-write", action = ArgAction::SetFalse)]
    pub read_only: bool,

    /// Maximum number of pooled connections.
    #[arg(long, default_value_t = 4)]
    pub pool_size: u32,

    /// Population (subject) table.
    #[arg(long, default_value = DEFAULT_SUBJECT_TABLE)]
    pub subject_table: String,

    /// Claims table.
    #[arg(long, default_value = DEFAULT_CLAIM_TABLE)]
    pub claim_table: String,
}

impl DbArgs {
    pub fn to_config(&self) -> DbConfig {
        DbConfig {
            database: self.database.clone().into(),
            read_only: self.read_only,
            pool_size: self.pool_size,
            subject_table: self.subject_table.clone(),
            claim_table: self.claim_table.clone(),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub db: DbArgs,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8787)]
    pub port: u16,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Metric name, e.g. disease_count_by_race.
    pub metric: String,

    /// Metric inputs in catalog order, e.g. `cancer` or `median female`.
    pub inputs: Vec<String>,
}
