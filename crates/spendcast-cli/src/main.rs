//! Spendcast CLI - Expense tracking and forecasting
//!
//! Usage:
//!   spendcast init                        Initialize database
//!   spendcast add 12.50 -c Food           Record an expense
//!   spendcast forecast --mode months      Forecast the next months
//!   spendcast serve --port 3000           Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use spendcast_core::models::{ExpenseUpdate, Granularity};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Categories => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_categories(&db)
        }
        Commands::Add {
            amount,
            category,
            date,
            description,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let date = commands::parse_date_arg(date.as_deref(), "date")?.unwrap_or(today);
            commands::cmd_add(&db, &cli.user, date, amount, &category, description).map(|_| ())
        }
        Commands::List { filter, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_list(&db, &cli.user, &filter, limit)
        }
        Commands::Edit {
            id,
            date,
            amount,
            category,
            description,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let changes = ExpenseUpdate {
                date: commands::parse_date_arg(date.as_deref(), "date")?,
                amount,
                category,
                description,
            };
            commands::cmd_edit(&db, &cli.user, id, &changes)
        }
        Commands::Delete { id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_delete(&db, &cli.user, id)
        }
        Commands::Export { output, filter } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_export(&db, &cli.user, &filter, output.as_deref())
        }
        Commands::Series {
            granularity,
            from,
            to,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let granularity: Granularity = granularity
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            commands::cmd_series(&db, &cli.user, granularity, from, to)
        }
        Commands::Stats { year } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_stats(&db, &cli.user, year, today)
        }
        Commands::Forecast { mode, value, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_forecast(
                &db,
                &cli.user,
                &mode,
                value,
                cli.config.as_deref(),
                today,
                json,
            )
        }
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
                cli.config.as_deref(),
            )
            .await
        }
    }
}
