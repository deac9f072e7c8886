//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `parse_date_arg` - Shared YYYY-MM-DD argument parsing
//! - `cmd_init` - Initialize the database
//! - `cmd_categories` - List the category catalogue

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use spendcast_core::db::Database;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    let db = if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")?
    } else {
        Database::new(path_str).context("Failed to open database")?
    };

    // Idempotent, so databases created by older versions pick up new categories
    db.seed_categories().context("Failed to seed categories")?;
    Ok(db)
}

/// Parse an optional YYYY-MM-DD argument
pub fn parse_date_arg(value: Option<&str>, name: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .with_context(|| format!("Invalid --{} date format (use YYYY-MM-DD)", name))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let categories = db.list_categories()?;
    println!("   {} categories available", categories.len());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record an expense: spendcast add 12.50 --category Food");
    println!("  2. Forecast spending: spendcast forecast --mode months --value 3");
    println!("  3. Start web UI: spendcast serve");

    Ok(())
}

pub fn cmd_categories(db: &Database) -> Result<()> {
    let categories = db.list_categories()?;

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────");
    for category in categories {
        println!("   {}", category.name);
    }

    Ok(())
}
