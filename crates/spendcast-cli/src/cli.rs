//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use spendcast_server::auth::LOCAL_USER;

/// Spendcast - Track expenses and forecast what comes next
#[derive(Parser)]
#[command(name = "spendcast")]
#[command(about = "Self-hosted expense tracker with spending forecasts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "spendcast.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SPENDCAST_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Forecast config file (TOML)
    ///
    /// Defaults to forecast.toml in the platform data directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User whose expenses are read and written
    #[arg(long, default_value = LOCAL_USER, global = true)]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Filters shared by list and export
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Category names (comma-separated)
    #[arg(short, long)]
    pub categories: Option<String>,

    /// Minimum amount
    #[arg(long)]
    pub min_amount: Option<f64>,

    /// Maximum amount
    #[arg(long)]
    pub max_amount: Option<f64>,

    /// Search descriptions
    #[arg(short, long)]
    pub search: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// List expense categories
    Categories,

    /// Record an expense
    Add {
        /// Amount spent (must be positive)
        amount: f64,

        /// Category name
        #[arg(short, long)]
        category: String,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List expenses, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Change fields of an expense
    Edit {
        /// Expense ID
        id: i64,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New amount
        #[arg(long)]
        amount: Option<f64>,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete an expense
    Delete {
        /// Expense ID
        id: i64,
    },

    /// Export expenses to CSV
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show per-period totals with empty periods filled in
    Series {
        /// Granularity: daily, weekly, monthly
        #[arg(short, long, default_value = "monthly")]
        granularity: String,

        /// Start date (YYYY-MM-DD); requires --to
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD); requires --from
        #[arg(long)]
        to: Option<String>,
    },

    /// Show yearly statistics
    Stats {
        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Forecast future spending
    Forecast {
        /// Forecast mode: months or year
        #[arg(short, long, default_value = "months")]
        mode: String,

        /// Number of months (1-12), or the calendar year
        #[arg(long, default_value = "3")]
        value: i64,

        /// Print the full forecast as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires an identity header from a reverse
        /// proxy or an API key.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}
