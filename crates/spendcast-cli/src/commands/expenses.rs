//! Expense command implementations

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use spendcast_core::db::{Database, ExpenseFilter};
use spendcast_core::models::{ExpenseUpdate, NewExpense};

use super::{parse_date_arg, truncate};
use crate::cli::FilterArgs;

/// Owned filter values parsed from `FilterArgs`
pub struct ListFilter {
    date_range: Option<(NaiveDate, NaiveDate)>,
    categories: Option<Vec<String>>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    search: Option<String>,
}

impl ListFilter {
    pub fn from_args(args: &FilterArgs) -> Result<Self> {
        let from = parse_date_arg(args.from.as_deref(), "from")?;
        let to = parse_date_arg(args.to.as_deref(), "to")?;

        let date_range = match (from, to) {
            (None, None) => None,
            // Open-ended ranges are bounded by four-digit years, as dates compare as text
            (from, to) => match (
                from.or(NaiveDate::from_ymd_opt(1, 1, 1)),
                to.or(NaiveDate::from_ymd_opt(9999, 12, 31)),
            ) {
                (Some(from), Some(to)) if from <= to => Some((from, to)),
                _ => bail!("--from must not be after --to"),
            },
        };

        let categories = args.categories.as_ref().map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(Self {
            date_range,
            categories,
            min_amount: args.min_amount,
            max_amount: args.max_amount,
            search: args.search.clone(),
        })
    }

    pub fn filter<'a>(&'a self, owner: &'a str) -> ExpenseFilter<'a> {
        ExpenseFilter::new(owner)
            .date_range(self.date_range)
            .categories(self.categories.as_deref())
            .min_amount(self.min_amount)
            .max_amount(self.max_amount)
            .search(self.search.as_deref())
    }
}

pub fn cmd_add(
    db: &Database,
    owner: &str,
    date: NaiveDate,
    amount: f64,
    category: &str,
    description: Option<String>,
) -> Result<i64> {
    let id = db.insert_expense(
        owner,
        &NewExpense {
            date,
            amount,
            category: category.to_string(),
            description,
        },
    )?;

    println!("✅ Recorded expense {} ({:.2} in {} on {})", id, amount, category, date);
    Ok(id)
}

pub fn cmd_list(db: &Database, owner: &str, args: &FilterArgs, limit: i64) -> Result<()> {
    let parsed = ListFilter::from_args(args)?;
    let expenses = db.list_expenses_filtered(parsed.filter(owner), Some(limit.max(1)), 0)?;

    if expenses.is_empty() {
        println!("No expenses found. Record one with:");
        println!("  spendcast add 12.50 --category Food");
        return Ok(());
    }

    let total = db.count_expenses_filtered(parsed.filter(owner))?;

    println!();
    println!("📝 Expenses ({} of {})", expenses.len(), total);
    println!("   ─────────────────────────────────────────────────────────────");

    for expense in expenses {
        println!(
            "   [{}] {} │ {:>10.2} │ {:15} │ {}",
            expense.id,
            expense.date,
            expense.amount,
            truncate(&expense.category, 15),
            truncate(expense.description.as_deref().unwrap_or(""), 30)
        );
    }

    Ok(())
}

pub fn cmd_edit(db: &Database, owner: &str, id: i64, changes: &ExpenseUpdate) -> Result<()> {
    let (expense, fields) = db.edit_expense(owner, id, changes)?;

    let names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
    println!("✅ Updated expense {} ({})", expense.id, names.join(", "));
    println!(
        "   {} │ {:.2} │ {} │ {}",
        expense.date,
        expense.amount,
        expense.category,
        expense.description.as_deref().unwrap_or("")
    );

    Ok(())
}

pub fn cmd_delete(db: &Database, owner: &str, id: i64) -> Result<()> {
    db.remove_expense(owner, id)?;
    println!("🗑️  Deleted expense {}", id);
    Ok(())
}

pub fn cmd_export(
    db: &Database,
    owner: &str,
    args: &FilterArgs,
    output: Option<&Path>,
) -> Result<()> {
    let parsed = ListFilter::from_args(args)?;
    let csv = db.export_expenses_csv(parsed.filter(owner))?;

    match output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            file.write_all(csv.as_bytes())?;

            let rows = csv.lines().count().saturating_sub(1);
            println!("✅ Exported {} expenses to {}", rows, path.display());
        }
        None => {
            // Write to stdout
            print!("{}", csv);
        }
    }

    Ok(())
}
