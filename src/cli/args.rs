use clap::{Args, Parser, Subcommand};
use omnidb::Condition;

/// CLI entry point for omnidb
#[derive(Parser, Debug)]
#[command(
    name = "omnidb",
    version,
    about = "Dialect-aware ODBC metadata inspector"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Environment (loads config/{env}.toml)
    #[arg(long, global = true)]
    pub env: Option<String>,

    /// Log debug output, including enrichment statements
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Catalog filter shared by the metadata commands
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct FilterArgs {
    #[arg(long)]
    pub catalog: Option<String>,

    /// Schema name or pattern
    #[arg(long)]
    pub schema: Option<String>,

    /// Table name or pattern
    #[arg(long)]
    pub table: Option<String>,
}

impl FilterArgs {
    pub fn condition(&self) -> Condition {
        Condition {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            table: self.table.clone(),
            ..Condition::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the dialect for a DBMS name without connecting
    Dialect {
        /// DBMS product name as reported by the driver
        #[arg(long)]
        dbms: String,

        /// Driver file or description
        #[arg(long, default_value = "")]
        driver: String,
    },

    /// List schemas
    Schemas {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[arg(long)]
        catalog: Option<String>,
    },

    /// Show the session's default schema
    CurrentSchema {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,
    },

    /// List tables
    Tables {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Table type, e.g. TABLE or VIEW
        #[arg(long)]
        table_type: Option<String>,
    },

    /// List columns
    Columns {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Column name or pattern
        #[arg(long)]
        column: Option<String>,
    },

    /// List primary key columns
    PrimaryKeys {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Describe a statement's result columns and parameters
    Query {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[arg(long)]
        sql: String,

        /// Report column labels instead of names
        #[arg(long)]
        label: bool,

        /// Also run the statement and return its rows
        #[arg(long)]
        fetch: bool,
    },

    /// Run a statement and print its rows
    Records {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[arg(long)]
        sql: String,
    },

    /// Run a statement, discarding any rows
    Execute {
        /// ODBC connection string
        #[arg(long)]
        conn: Option<String>,

        #[arg(long)]
        sql: String,
    },

    /// Generate configuration file
    Config {
        /// Output path for config file; with --env, config/{env}.toml is written too
        #[arg(long, default_value = "config.toml")]
        output: String,
    },
}
